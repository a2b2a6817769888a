//! Scoped acquisition of a device session.

use tracing::{debug, trace, warn};

use crate::types::{DeviceHandle, PropertyValue};
use crate::{MonitorError, Result};

use super::services::{DeviceOps, STATUS_OK};

/// An active session on one device handle.
///
/// [`open`](DeviceSession::open) drives the native lifecycle
/// connect → validate pairing → start session; `Drop` guarantees the
/// symmetric teardown (stop session, then disconnect) on every exit path,
/// including the early aborts:
///
/// - connect fails: nothing to clean up
/// - pairing validation fails: disconnect still runs
/// - session start fails: disconnect still runs, stop is skipped because
///   the session never became active
///
/// Property reads borrow the session, so handle-scoped queries cannot
/// outlive it.
pub struct DeviceSession<'a> {
    ops: &'a dyn DeviceOps,
    handle: DeviceHandle,
    session_active: bool,
}

impl<'a> DeviceSession<'a> {
    /// Connect, validate pairing, and start a session on `handle`.
    pub fn open(ops: &'a dyn DeviceOps, handle: DeviceHandle) -> Result<Self> {
        let status = ops.connect(handle);
        if status != STATUS_OK {
            return Err(MonitorError::ConnectFailed { status });
        }
        trace!("device connected");

        // From here on the guard owns the disconnect, whatever happens next.
        let mut session = Self { ops, handle, session_active: false };

        let status = session.ops.validate_pairing(handle);
        if status != STATUS_OK {
            debug!(status, "device pairing not trusted");
            return Err(MonitorError::UntrustedDevice { status });
        }

        let status = session.ops.start_session(handle);
        if status != STATUS_OK {
            debug!(status, "session start rejected");
            return Err(MonitorError::SessionStartFailed { status });
        }
        session.session_active = true;
        trace!("device session active");

        Ok(session)
    }

    /// Query one property within the active session.
    pub fn copy_value(&self, domain: Option<&str>, key: &str) -> Option<PropertyValue> {
        self.ops.copy_value(self.handle, domain, key)
    }

    /// The device's stable hardware identifier.
    pub fn identifier(&self) -> Option<String> {
        self.ops.copy_identifier(self.handle)
    }
}

impl std::fmt::Debug for DeviceSession<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSession")
            .field("handle", &self.handle)
            .field("session_active", &self.session_active)
            .finish_non_exhaustive()
    }
}

impl Drop for DeviceSession<'_> {
    fn drop(&mut self) {
        if self.session_active {
            let status = self.ops.stop_session(self.handle);
            if status != STATUS_OK {
                warn!(status, "stop session reported failure during teardown");
            }
        }
        let status = self.ops.disconnect(self.handle);
        if status != STATUS_OK {
            warn!(status, "disconnect reported failure during teardown");
        }
    }
}
