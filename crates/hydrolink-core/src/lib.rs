//! Core types for hydrolink.
//!
//! This crate defines the shared vocabulary of the project: the serde model
//! of the Orbit B-hyve REST and event JSON, the closed event enumeration,
//! the outbound command wire format, the device handler trait, and the
//! device/handler registry.

pub mod command;
pub mod config;
pub mod device;
pub mod event;
pub mod handler;
pub mod registry;

pub use command::{ClientRequest, StationRunTime};
pub use config::{CloudConfig, endpoints, env_vars};
pub use device::{
    Battery, Device, DeviceKind, DeviceStatus, Program, RunTime, WateringMode, WateringPlan,
    WateringStatus,
};
pub use event::{DeviceEvent, EventParseError};
pub use handler::DeviceHandler;
pub use registry::DeviceRegistry;
