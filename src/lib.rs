//! Modern, type-safe Rust library for host and handheld-device battery
//! telemetry.
//!
//! Voltwatch surfaces live charge, health, and power telemetry for the host
//! computer's battery and for any handheld devices tethered to it.
//!
//! # Features
//!
//! - **Device discovery**: attach/detach notifications from the system's
//!   private device-management library, bound at runtime
//! - **Telemetry extraction**: a fallback chain reconciling the
//!   inconsistent battery records different firmware revisions expose
//! - **Snapshot streaming**: a push-style device-list stream for
//!   presentation layers
//! - **Host battery**: one-shot and fixed-interval smart battery readings
//! - **History**: a 24-hour rolling level% series persisted to disk
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use futures::StreamExt;
//! use voltwatch::Voltwatch;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> voltwatch::Result<()> {
//!     let monitor = Voltwatch::monitor()?;
//!     let mut snapshots = Box::pin(monitor.snapshots());
//!
//!     while let Some(devices) = snapshots.next().await {
//!         for device in devices.iter() {
//!             println!(
//!                 "{}: {}% ({:.1}% health)",
//!                 device.display_name,
//!                 device.level_percent,
//!                 device.health_percent()
//!             );
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
pub mod types;

// Monitoring subsystems
pub mod history;
pub mod host;
pub mod mobile;

// Platform-specific modules
#[cfg(target_os = "macos")]
pub mod macos;

// Core exports
pub use error::{MonitorError, Result};
pub use types::*;

// Subsystem exports
pub use history::{HistoryPoint, HistoryStore};
pub use host::{HostBatteryReader, HostBatteryStats, PowerSource};
pub use mobile::{DeviceMonitor, DeviceOps, DeviceSession, EventPipeline, NotificationSource};

#[cfg(target_os = "macos")]
pub use macos::{MobileDeviceLibrary, NativeDeviceServices, SmartBatterySource};

/// Unified entry point for battery monitoring.
///
/// The factory wires the platform bindings to the platform-neutral
/// subsystems. On platforms without the native capabilities the device and
/// host constructors return [`UnsupportedPlatform`] and callers degrade to
/// whatever subsystems remain.
///
/// [`UnsupportedPlatform`]: MonitorError::UnsupportedPlatform
pub struct Voltwatch;

impl Voltwatch {
    /// Start monitoring tethered handheld devices.
    ///
    /// Loads the device-management library from its well-known path,
    /// registers the process-lifetime notification subscription, and spawns
    /// the registry task. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// All failure modes are subsystem-fatal: [`LibraryUnavailable`] when
    /// the library cannot be located, [`SubscriptionUnavailable`] when the
    /// notification capability is absent or rejected. There is no retry;
    /// the device list simply stays empty.
    ///
    /// [`LibraryUnavailable`]: MonitorError::LibraryUnavailable
    /// [`SubscriptionUnavailable`]: MonitorError::SubscriptionUnavailable
    #[cfg(target_os = "macos")]
    pub fn monitor() -> Result<DeviceMonitor> {
        let library = MobileDeviceLibrary::load()?;
        DeviceMonitor::start(std::sync::Arc::new(NativeDeviceServices::new(library)))
    }

    /// Attempt to start device monitoring on an unsupported platform.
    ///
    /// Always returns [`UnsupportedPlatform`]; the device-management
    /// library only exists on macOS.
    ///
    /// [`UnsupportedPlatform`]: MonitorError::UnsupportedPlatform
    #[cfg(not(target_os = "macos"))]
    pub fn monitor() -> Result<DeviceMonitor> {
        Err(MonitorError::unsupported_platform("Handheld device monitoring", "macOS"))
    }

    /// A reader for the host computer's battery.
    #[cfg(target_os = "macos")]
    pub fn host() -> Result<HostBatteryReader> {
        Ok(HostBatteryReader::new(std::sync::Arc::new(SmartBatterySource)))
    }

    /// Attempt to create a host battery reader on an unsupported platform.
    #[cfg(not(target_os = "macos"))]
    pub fn host() -> Result<HostBatteryReader> {
        Err(MonitorError::unsupported_platform("Host battery reading", "macOS"))
    }

    /// Open the level history store at `path`.
    pub fn history(path: impl Into<std::path::PathBuf>) -> HistoryStore {
        HistoryStore::open(path)
    }
}
