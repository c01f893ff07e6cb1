//! Decode tests against captured-shape Orbit API responses.

use hydrolink_core::{Device, DeviceKind, Program};

#[test]
fn devices_response_decodes() {
    let raw = r#"[
        {
            "type": "sprinkler_timer",
            "id": "5ad72e5a4f0c72d7d6257c5b",
            "name": "Back Yard",
            "mac_address": "44:67:55:aa:bb:cc",
            "num_stations": "6",
            "hardware_version": "HT25-0000",
            "firmware_version": "0042",
            "is_connected": true,
            "last_connected_at": "2021-06-01T10:47:00.000Z",
            "suggested_start_time": "06:00",
            "battery": { "percent": 67.5, "charging": false },
            "status": {
                "run_mode": "auto",
                "next_start_time": "2021-06-02T06:00:00-04:00",
                "rain_delay": 24,
                "rain_delay_weather_type": "storm",
                "rain_delay_started_at": "2021-06-01T08:00:00.000Z",
                "rain_sensor_hold": false,
                "watering_status": {
                    "program": "a",
                    "current_station": 2,
                    "started_watering_station_at": "2021-06-01T10:40:00.000Z"
                }
            },
            "user_id": "5ad72e5a4f0c72d7d6257aaa"
        },
        {
            "type": "bridge",
            "id": "5ad72e5a4f0c72d7d6257ccc",
            "name": "Orbit Hub",
            "is_connected": true
        }
    ]"#;

    let devices: Vec<Device> = serde_json::from_str(raw).unwrap();
    assert_eq!(devices.len(), 2);

    let timer = &devices[0];
    assert_eq!(timer.kind, DeviceKind::SprinklerTimer);
    assert_eq!(timer.num_stations.as_deref(), Some("6"));
    let status = timer.status.as_ref().unwrap();
    assert_eq!(status.rain_delay, Some(24));
    let watering = status.watering_status.as_ref().unwrap();
    assert_eq!(watering.current_station, Some(2));

    assert_eq!(devices[1].kind, DeviceKind::Bridge);
    assert!(devices[1].status.is_none());
}

#[test]
fn programs_response_decodes() {
    let raw = r#"[
        {
            "id": "5b1fd9f84f0c72d7d6257fff",
            "device_id": "5ad72e5a4f0c72d7d6257c5b",
            "name": "Morning",
            "program": "a",
            "enabled": true,
            "budget": 100,
            "is_smart_program": false,
            "run_times": [
                { "station": 1, "run_time": 10 },
                { "station": 2, "run_time": 15 }
            ],
            "start_times": [ "06:00" ],
            "watering_plan": [
                {
                    "date": "2021-06-02",
                    "run_times": [ { "station": 1, "run_time": 8 } ],
                    "start_times": [ "06:00" ]
                }
            ]
        }
    ]"#;

    let programs: Vec<Program> = serde_json::from_str(raw).unwrap();
    assert_eq!(programs.len(), 1);
    let program = &programs[0];
    assert_eq!(program.program.as_deref(), Some("a"));
    assert_eq!(program.run_times.len(), 2);
    assert_eq!(program.watering_plan[0].run_times[0].run_time, 8);
}
