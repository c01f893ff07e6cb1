//! Orbit cloud REST client and background cloud service.
//!
//! [`CloudClient`] wraps the three REST calls this project needs (login,
//! device inventory, sprinkler timer programs). [`CloudService`] runs the
//! login and periodic device-refresh jobs and feeds snapshots into the
//! [`DeviceRegistry`](hydrolink_core::DeviceRegistry).

pub mod client;
pub mod service;

use thiserror::Error;

pub use client::{CloudClient, CloudSession, LoginResponse};
pub use service::{CloudService, ServiceTiming};

/// Errors from the cloud REST layer.
#[derive(Debug, Error)]
pub enum CloudError {
    /// Transport-level request failure.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The service rejected the credentials or session token.
    #[error("not authorized")]
    Unauthorized,

    /// Any other non-success HTTP status.
    #[error("service returned status {0}")]
    Api(u16),

    /// The response body did not decode.
    #[error("error parsing response: {0}")]
    Json(#[from] serde_json::Error),

    /// An authenticated call was made before login completed.
    #[error("not logged in")]
    NotLoggedIn,
}

/// Result type for cloud operations.
pub type Result<T> = std::result::Result<T, CloudError>;
