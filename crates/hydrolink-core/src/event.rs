//! Inbound events pushed over the Orbit event stream.
//!
//! Every event carries a top-level `"event"` string tag. [`DeviceEvent`]
//! is the closed enumeration of the tags this client understands; anything
//! else lands in [`DeviceEvent::Unknown`] so new service events never break
//! dispatch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::device::Program;

/// Error parsing an inbound event payload.
#[derive(Debug, Error)]
pub enum EventParseError {
    /// The message is not a JSON object.
    #[error("event payload is not a JSON object")]
    NotAnObject,

    /// The message has no `event` tag.
    #[error("event payload has no \"event\" field")]
    MissingTag,

    /// The tag is known but the payload does not decode.
    #[error("malformed {event} payload: {source}")]
    MalformedPayload {
        event: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

/// A typed event from the event stream.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// The run mode changed (auto / manual / off).
    ChangeMode(ChangeModeEvent),
    /// A station started watering.
    WateringInProgress(WateringInProgressEvent),
    /// The active watering run finished.
    WateringComplete(DeviceStamped),
    /// The device returned to idle.
    DeviceIdle(DeviceStamped),
    /// A rain delay was set or cleared.
    RainDelay(RainDelayEvent),
    /// A watering program was created or updated.
    ProgramChanged(ProgramChangedEvent),
    /// Battery dropped below the service's threshold.
    LowBattery(LowBatteryEvent),
    /// A previous low-battery alarm cleared.
    ClearLowBattery(DeviceStamped),
    /// The flow sensor reported a state change.
    FlowSensorStateChanged(DeviceStamped),
    /// The device (re)connected to the Orbit service.
    Connected(DeviceStamped),
    /// The device dropped off the Orbit service.
    Disconnected(DeviceStamped),
    /// Any event tag this client does not model.
    Unknown { event: String, payload: Value },
}

/// Payload of a `change_mode` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeModeEvent {
    pub mode: String,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub stations: Vec<EventStation>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Station entry inside a `change_mode` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStation {
    pub station: u32,
    /// Minutes; the service reports fractional values.
    pub run_time: f64,
}

/// Payload of a `watering_in_progress_notification` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WateringInProgressEvent {
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub current_station: Option<u32>,
    /// Minutes remaining for the current station.
    #[serde(default)]
    pub run_time: Option<f64>,
    #[serde(default)]
    pub started_watering_station_at: Option<String>,
    #[serde(default)]
    pub rain_sensor_hold: Option<bool>,
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Payload of a `rain_delay` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RainDelayEvent {
    #[serde(default)]
    pub device_id: Option<String>,
    /// Hours; 0 clears the delay.
    pub delay: u32,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Payload of a `program_changed` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramChangedEvent {
    #[serde(default)]
    pub lifecycle_phase: Option<String>,
    #[serde(default)]
    pub program: Option<Program>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Payload of a `low_battery` event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LowBatteryEvent {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub percent_remaining: Option<f64>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Minimal payload shared by events that carry nothing but identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceStamped {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl DeviceEvent {
    /// Parse a raw event-stream message into a typed event.
    ///
    /// Unrecognized tags succeed as [`DeviceEvent::Unknown`]; a known tag
    /// with a payload that fails typed decode is an error the caller may
    /// log and skip.
    pub fn parse(raw: &str) -> Result<Self, EventParseError> {
        let value: Value =
            serde_json::from_str(raw).map_err(|_| EventParseError::NotAnObject)?;
        let tag = value
            .get("event")
            .and_then(Value::as_str)
            .ok_or(EventParseError::MissingTag)?
            .to_string();

        fn decode<T: serde::de::DeserializeOwned>(
            event: &'static str,
            value: Value,
        ) -> Result<T, EventParseError> {
            serde_json::from_value(value)
                .map_err(|source| EventParseError::MalformedPayload { event, source })
        }

        Ok(match tag.as_str() {
            "change_mode" => DeviceEvent::ChangeMode(decode("change_mode", value)?),
            "watering_in_progress_notification" => DeviceEvent::WateringInProgress(decode(
                "watering_in_progress_notification",
                value,
            )?),
            "watering_complete" => {
                DeviceEvent::WateringComplete(decode("watering_complete", value)?)
            }
            "device_idle" => DeviceEvent::DeviceIdle(decode("device_idle", value)?),
            "rain_delay" => DeviceEvent::RainDelay(decode("rain_delay", value)?),
            "program_changed" => DeviceEvent::ProgramChanged(decode("program_changed", value)?),
            "low_battery" => DeviceEvent::LowBattery(decode("low_battery", value)?),
            "clear_low_battery" => {
                DeviceEvent::ClearLowBattery(decode("clear_low_battery", value)?)
            }
            "flow_sensor_state_changed" => {
                DeviceEvent::FlowSensorStateChanged(decode("flow_sensor_state_changed", value)?)
            }
            "connected" => DeviceEvent::Connected(decode("connected", value)?),
            "disconnected" => DeviceEvent::Disconnected(decode("disconnected", value)?),
            _ => DeviceEvent::Unknown {
                event: tag,
                payload: value,
            },
        })
    }

    /// The wire tag of this event.
    pub fn tag(&self) -> &str {
        match self {
            DeviceEvent::ChangeMode(_) => "change_mode",
            DeviceEvent::WateringInProgress(_) => "watering_in_progress_notification",
            DeviceEvent::WateringComplete(_) => "watering_complete",
            DeviceEvent::DeviceIdle(_) => "device_idle",
            DeviceEvent::RainDelay(_) => "rain_delay",
            DeviceEvent::ProgramChanged(_) => "program_changed",
            DeviceEvent::LowBattery(_) => "low_battery",
            DeviceEvent::ClearLowBattery(_) => "clear_low_battery",
            DeviceEvent::FlowSensorStateChanged(_) => "flow_sensor_state_changed",
            DeviceEvent::Connected(_) => "connected",
            DeviceEvent::Disconnected(_) => "disconnected",
            DeviceEvent::Unknown { event, .. } => event,
        }
    }
}
