//! Shared configuration: service endpoints, env var names, cloud account
//! settings.

use std::time::Duration;

/// Orbit service endpoints.
pub mod endpoints {
    /// Login, returns the session token used by all other calls.
    pub const LOGIN: &str = "https://api.orbitbhyve.com/v1/session";
    /// Device inventory for a user. Append the user id.
    pub const DEVICES: &str = "https://api.orbitbhyve.com/v1/devices?user_id=";
    /// Sprinkler timer programs for a device. Append the device id.
    pub const PROGRAMS: &str = "https://api.orbitbhyve.com/v1/sprinkler_timer_programs?device_id=";
    /// WebSocket event stream.
    pub const EVENTS: &str = "wss://api.orbitbhyve.com/v1/events";

    /// Value the service expects in the `orbit-app-id` header.
    pub const APP_ID: &str = "Orbit Support Dashboard";
}

/// Environment variable names used by the CLI.
pub mod env_vars {
    pub const EMAIL: &str = "HYDROLINK_EMAIL";
    pub const PASSWORD: &str = "HYDROLINK_PASSWORD";
}

/// Cloud account configuration.
#[derive(Debug, Clone)]
pub struct CloudConfig {
    /// Account email used for login.
    pub email: String,
    /// Account password.
    pub password: String,
    /// Interval between device inventory refreshes.
    pub refresh_interval: Duration,
}

impl CloudConfig {
    /// Create a configuration for the given account.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            refresh_interval: Duration::from_secs(5 * 60),
        }
    }

    /// Override the device refresh interval.
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }
}
