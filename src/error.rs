//! Error types for battery monitoring.
//!
//! All errors implement the `std::error::Error` trait and carry structured
//! context. The taxonomy distinguishes two severities:
//!
//! - **Subsystem-fatal**: the handheld-device feature as a whole is
//!   unavailable (`LibraryUnavailable`, `SubscriptionUnavailable`,
//!   `UnsupportedPlatform`). Callers degrade to an empty device list and do
//!   not retry.
//! - **Per-device / per-operation**: one device fails to appear or update
//!   this cycle (`ConnectFailed`, `UntrustedDevice`, `SessionStartFailed`,
//!   `IncompleteTelemetry`), or an auxiliary path fails (`HostBattery`,
//!   `History`). These never propagate across devices or into the host
//!   battery path.
//!
//! ```rust
//! use voltwatch::MonitorError;
//!
//! let error = MonitorError::ConnectFailed { status: -402653103 };
//! assert!(!error.is_subsystem_fatal());
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for monitoring operations.
pub type Result<T, E = MonitorError> = std::result::Result<T, E>;

/// Main error type for battery monitoring operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum MonitorError {
    #[error("device management library unavailable at {path}")]
    LibraryUnavailable {
        path: PathBuf,
        #[source]
        source: libloading::Error,
    },

    #[error("device notification subscription unavailable: {reason}")]
    SubscriptionUnavailable { reason: String },

    #[error("device connect failed with native status {status:#x}")]
    ConnectFailed { status: i32 },

    #[error("device is not paired with this host (native status {status:#x})")]
    UntrustedDevice { status: i32 },

    #[error("device session start failed with native status {status:#x}")]
    SessionStartFailed { status: i32 },

    #[error("device telemetry incomplete: hardware identifier unreadable")]
    IncompleteTelemetry,

    #[error("host battery query failed: {reason}")]
    HostBattery { reason: String },

    #[error("history persistence error: {path}")]
    History {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{feature} is only available on {required_platform}")]
    UnsupportedPlatform { feature: String, required_platform: String },
}

impl MonitorError {
    /// Returns whether this error disables the whole handheld-device
    /// subsystem, as opposed to affecting a single device or cycle.
    ///
    /// Subsystem-fatal errors are reported once; there is no retry loop.
    pub fn is_subsystem_fatal(&self) -> bool {
        match self {
            MonitorError::LibraryUnavailable { .. } => true,
            MonitorError::SubscriptionUnavailable { .. } => true,
            MonitorError::UnsupportedPlatform { .. } => true,
            MonitorError::ConnectFailed { .. } => false,
            MonitorError::UntrustedDevice { .. } => false,
            MonitorError::SessionStartFailed { .. } => false,
            MonitorError::IncompleteTelemetry => false,
            MonitorError::HostBattery { .. } => false,
            MonitorError::History { .. } => false,
        }
    }

    /// Helper constructor for library load failures with path context.
    pub fn library_unavailable(path: impl Into<PathBuf>, source: libloading::Error) -> Self {
        MonitorError::LibraryUnavailable { path: path.into(), source }
    }

    /// Helper constructor for subscription failures.
    pub fn subscription_unavailable(reason: impl Into<String>) -> Self {
        MonitorError::SubscriptionUnavailable { reason: reason.into() }
    }

    /// Helper constructor for host battery query failures.
    pub fn host_battery(reason: impl Into<String>) -> Self {
        MonitorError::HostBattery { reason: reason.into() }
    }

    /// Helper constructor for history persistence failures.
    pub fn history_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        MonitorError::History { path: path.into(), source }
    }

    /// Helper constructor for unsupported platform errors.
    pub fn unsupported_platform(
        feature: impl Into<String>,
        required_platform: impl Into<String>,
    ) -> Self {
        MonitorError::UnsupportedPlatform {
            feature: feature.into(),
            required_platform: required_platform.into(),
        }
    }
}
