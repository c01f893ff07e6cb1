//! Outbound messages sent over the event stream.

use serde::{Deserialize, Serialize};

use crate::device::WateringMode;

/// Station/run-time pair for a manual watering run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRunTime {
    pub station: u32,
    /// Minutes.
    pub run_time: u32,
}

/// A request the client writes to the event stream.
///
/// The service routes on the `event` tag, so the enum serializes with
/// `{"event": "..."}` at the top level.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ClientRequest {
    /// Subscribe handshake, sent once per connection.
    AppConnection {
        orbit_session_token: String,
        subscribe_device_id: String,
    },
    /// Keep-alive no-op.
    Ping,
    /// Change the run mode; manual mode carries the stations to run.
    ChangeMode {
        device_id: String,
        mode: WateringMode,
        #[serde(skip_serializing_if = "Option::is_none")]
        stations: Option<Vec<StationRunTime>>,
    },
    /// Set (or clear, with 0) a rain delay in hours.
    RainDelay { device_id: String, delay: u32 },
}

impl ClientRequest {
    /// Subscribe request for one device.
    pub fn subscribe(session_token: impl Into<String>, device_id: impl Into<String>) -> Self {
        ClientRequest::AppConnection {
            orbit_session_token: session_token.into(),
            subscribe_device_id: device_id.into(),
        }
    }

    /// Serialize to the wire string.
    pub fn to_json(&self) -> String {
        // The enum is composed entirely of serializable primitives.
        serde_json::to_string(self).expect("ClientRequest serialization cannot fail")
    }
}
