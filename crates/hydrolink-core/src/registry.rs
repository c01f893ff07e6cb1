//! Device and handler registry.
//!
//! One explicit object owns the device snapshot cache and the per-device
//! handler map. Components that need either get a reference to the
//! registry; there is no ambient global state.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::device::Device;
use crate::handler::DeviceHandler;

/// Registry of known devices and their handlers, keyed by device id.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: RwLock<HashMap<String, Device>>,
    handlers: RwLock<HashMap<String, Arc<dyn DeviceHandler>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a device snapshot, replacing any previous one for the same id.
    pub async fn insert_device(&self, device: Device) {
        self.devices.write().await.insert(device.id.clone(), device);
    }

    /// Latest snapshot for a device, if the inventory has reported it.
    pub async fn device(&self, id: &str) -> Option<Device> {
        self.devices.read().await.get(id).cloned()
    }

    /// All known device snapshots.
    pub async fn devices(&self) -> Vec<Device> {
        self.devices.read().await.values().cloned().collect()
    }

    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }

    /// Register the handler for a device id, replacing any previous one.
    pub async fn register_handler(&self, handler: Arc<dyn DeviceHandler>) {
        let id = handler.device_id();
        debug!(device_id = %id, "registering device handler");
        self.handlers.write().await.insert(id, handler);
    }

    /// Remove and return the handler for a device id.
    pub async fn unregister_handler(&self, id: &str) -> Option<Arc<dyn DeviceHandler>> {
        debug!(device_id = %id, "unregistering device handler");
        self.handlers.write().await.remove(id)
    }

    pub async fn handler(&self, id: &str) -> Option<Arc<dyn DeviceHandler>> {
        self.handlers.read().await.get(id).cloned()
    }

    /// Store a snapshot and, if a handler is registered for the device,
    /// push the update to it.
    pub async fn apply_device_update(&self, device: Device) {
        let handler = self.handler(&device.id).await;
        self.insert_device(device.clone()).await;
        if let Some(handler) = handler {
            handler.on_device_update(&device).await;
        }
    }
}
