//! The device handler boundary.

use async_trait::async_trait;

use crate::device::Device;

/// Per-device callback surface.
///
/// One handler exists per physical device. The event stream pulls the
/// device id and session token from it on each connect, and pushes events
/// and connection-state changes back into it. The cloud service pushes
/// device snapshots from the periodic inventory refresh.
///
/// Callbacks are invoked from background tasks and must not block.
#[async_trait]
pub trait DeviceHandler: Send + Sync {
    /// The Orbit device id this handler is responsible for.
    fn device_id(&self) -> String;

    /// Current session token, or `None` before login has completed.
    async fn session_token(&self) -> Option<String>;

    /// An event arrived for this device. `raw` is the full message; typed
    /// decoding (and tolerance of malformed payloads) is the handler's
    /// concern.
    async fn on_event(&self, event_type: &str, raw: &str);

    /// A fresh device snapshot arrived from the inventory refresh.
    async fn on_device_update(&self, device: &Device);

    /// The event stream is connected and subscribed.
    async fn on_online(&self);

    /// The event stream is not connected.
    async fn on_offline(&self, reason: &str);
}
