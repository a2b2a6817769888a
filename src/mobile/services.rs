//! Seam traits over the native device-management library.
//!
//! Every native entry point is a synchronous, blocking call that may incur
//! USB I/O latency; nothing here runs on async runtime threads. The traits
//! exist so the pipeline, session guard, and extractor can be exercised
//! against mocks while the macOS module provides the real binding.

use crate::Result;
use crate::types::{DeviceHandle, PropertyValue};

use super::monitor::EventPipeline;

/// Native status code returned by device calls. Zero is success.
pub const STATUS_OK: i32 = 0;

/// Per-device operations of the device-management library.
///
/// Each operation corresponds to one optionally-resolved native symbol;
/// an absent symbol degrades only that operation (a nonzero status or a
/// `None` value), never the whole subsystem.
pub trait DeviceOps: Send + Sync {
    fn connect(&self, device: DeviceHandle) -> i32;
    fn validate_pairing(&self, device: DeviceHandle) -> i32;
    fn start_session(&self, device: DeviceHandle) -> i32;
    fn stop_session(&self, device: DeviceHandle) -> i32;
    fn disconnect(&self, device: DeviceHandle) -> i32;

    /// Query one property, optionally scoped to a domain. Valid only while
    /// a session is active, except for the identifier query.
    fn copy_value(
        &self,
        device: DeviceHandle,
        domain: Option<&str>,
        key: &str,
    ) -> Option<PropertyValue>;

    /// The lightest possible read: the stable hardware identifier, requiring
    /// no connection or session. Used both inside active sessions and as the
    /// best-effort lookup when a device disconnects.
    fn copy_identifier(&self, device: DeviceHandle) -> Option<String>;
}

/// The attach/detach notification capability.
pub trait NotificationSource: Send + Sync {
    /// Register the process-lifetime subscription, delivering every
    /// notification synchronously into `pipeline` from whatever thread the
    /// native layer chooses.
    ///
    /// Fails with [`SubscriptionUnavailable`] when the subscribe capability
    /// is absent. There is no unsubscribe; the subscription lives until
    /// process exit.
    ///
    /// [`SubscriptionUnavailable`]: crate::MonitorError::SubscriptionUnavailable
    fn subscribe(&self, pipeline: EventPipeline) -> Result<()>;
}
