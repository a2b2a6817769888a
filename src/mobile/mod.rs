//! Handheld-device discovery and telemetry extraction.
//!
//! This is the core subsystem: it drives the native device-management
//! library through a connect/authenticate/session lifecycle per device and
//! reconciles the inconsistent telemetry representations different firmware
//! revisions expose.
//!
//! ## Architecture
//!
//! - [`DeviceOps`] / [`NotificationSource`] are the seams to the native
//!   binding (implemented for macOS in [`crate::macos`], mocked in tests)
//! - [`DeviceSession`] enforces the acquire/release protocol around each
//!   handle
//! - [`extract`](self::extract) assembles [`BatteryTelemetry`] through an
//!   ordered fallback chain
//! - [`DeviceMonitor`] owns the registry task and exposes the snapshot
//!   stream consumed by presentation layers
//!
//! [`BatteryTelemetry`]: crate::BatteryTelemetry

pub mod extract;
mod monitor;
mod registry;
mod services;
mod session;

pub use monitor::{DeviceMonitor, EventPipeline};
pub use services::{DeviceOps, NotificationSource, STATUS_OK};
pub use session::DeviceSession;
