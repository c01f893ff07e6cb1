//! Serde model of the Orbit device and program JSON.
//!
//! Field names follow the wire format (snake_case). Fields the service
//! omits for some device types (battery on mains-powered timers, watering
//! status while idle) are `Option`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kind of Orbit device, from the `type` field of the inventory response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    SprinklerTimer,
    Bridge,
    /// Device types this client does not model.
    #[serde(untagged)]
    Other(String),
}

/// One device from the inventory response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    #[serde(rename = "type")]
    pub kind: DeviceKind,
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mac_address: Option<String>,
    /// Number of stations, reported by the service as a string.
    #[serde(default)]
    pub num_stations: Option<String>,
    /// Only present on battery-powered devices.
    #[serde(default)]
    pub battery: Option<Battery>,
    #[serde(default)]
    pub status: Option<DeviceStatus>,
    #[serde(default)]
    pub is_connected: Option<bool>,
    #[serde(default)]
    pub last_connected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub hardware_version: Option<String>,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default)]
    pub suggested_start_time: Option<String>,
}

/// Battery state for battery-powered timers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battery {
    pub percent: f64,
    #[serde(default)]
    pub charging: Option<bool>,
}

/// Operational status of a sprinkler timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStatus {
    #[serde(default)]
    pub run_mode: Option<String>,
    #[serde(default)]
    pub next_start_time: Option<String>,
    /// Present only while a station is actively watering.
    #[serde(default)]
    pub watering_status: Option<WateringStatus>,
    /// Rain delay in hours; 0 means no delay is active.
    #[serde(default)]
    pub rain_delay: Option<u32>,
    #[serde(default)]
    pub rain_delay_weather_type: Option<String>,
    #[serde(default)]
    pub rain_delay_started_at: Option<String>,
    #[serde(default)]
    pub rain_sensor_hold: Option<bool>,
}

/// The in-progress watering state nested in [`DeviceStatus`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WateringStatus {
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub current_station: Option<u32>,
    #[serde(default)]
    pub started_watering_station_at: Option<String>,
}

/// A sprinkler timer watering program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub id: Option<String>,
    pub device_id: String,
    #[serde(default)]
    pub name: Option<String>,
    /// Program slot letter ("a", "b", ...).
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Watering budget percentage.
    #[serde(default)]
    pub budget: Option<u32>,
    #[serde(default)]
    pub is_smart_program: Option<bool>,
    #[serde(default)]
    pub run_times: Vec<RunTime>,
    #[serde(default)]
    pub start_times: Vec<String>,
    #[serde(default)]
    pub watering_plan: Vec<WateringPlan>,
}

/// Per-station run time within a program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTime {
    pub station: u32,
    /// Minutes.
    pub run_time: u32,
}

/// One planned watering day of a smart program.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WateringPlan {
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub run_times: Vec<RunTime>,
    #[serde(default)]
    pub start_times: Vec<String>,
}

/// Run mode of a sprinkler timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WateringMode {
    Auto,
    Manual,
    Off,
}

impl fmt::Display for WateringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            WateringMode::Auto => "auto",
            WateringMode::Manual => "manual",
            WateringMode::Off => "off",
        };
        f.write_str(s)
    }
}

impl FromStr for WateringMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(WateringMode::Auto),
            "manual" => Ok(WateringMode::Manual),
            "off" => Ok(WateringMode::Off),
            other => Err(format!("unknown watering mode: {other}")),
        }
    }
}
