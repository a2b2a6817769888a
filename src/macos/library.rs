//! Runtime binding to the private device-management library.

use std::ffi::c_void;

use core_foundation_sys::base::CFTypeRef;
use core_foundation_sys::string::CFStringRef;
use libloading::Library;
use tracing::{debug, info};

use crate::{MonitorError, Result};

use super::device::AmDeviceNotificationInfo;

/// Fixed well-known path of the private framework binary.
pub const MOBILE_DEVICE_LIBRARY_PATH: &str =
    "/System/Library/PrivateFrameworks/MobileDevice.framework/MobileDevice";

pub(crate) type AmNotificationCallback =
    unsafe extern "C" fn(info: *mut AmDeviceNotificationInfo, context: *mut c_void);

pub(crate) type AmSubscribeFn = unsafe extern "C" fn(
    callback: AmNotificationCallback,
    unused0: u32,
    unused1: u32,
    context: *mut c_void,
    subscription: *mut *mut c_void,
) -> i32;

pub(crate) type AmDeviceCallFn = unsafe extern "C" fn(device: *mut c_void) -> i32;

pub(crate) type AmCopyValueFn =
    unsafe extern "C" fn(device: *mut c_void, domain: CFStringRef, key: CFStringRef) -> CFTypeRef;

pub(crate) type AmCopyIdentifierFn = unsafe extern "C" fn(device: *mut c_void) -> CFStringRef;

/// The bound library and its individually-resolved capabilities.
///
/// Bound once at startup and held for the process lifetime. The library is
/// never unloaded: handles from in-flight sessions are owned by the native
/// layer and unloading would invalidate them unsafely.
///
/// Each capability resolves independently; an absent symbol disables only
/// the dependent operation, which tolerates symbol skew across OS versions.
pub struct MobileDeviceLibrary {
    _library: Library,
    pub(crate) subscribe: Option<AmSubscribeFn>,
    pub(crate) connect: Option<AmDeviceCallFn>,
    pub(crate) validate_pairing: Option<AmDeviceCallFn>,
    pub(crate) start_session: Option<AmDeviceCallFn>,
    pub(crate) stop_session: Option<AmDeviceCallFn>,
    pub(crate) disconnect: Option<AmDeviceCallFn>,
    pub(crate) copy_value: Option<AmCopyValueFn>,
    pub(crate) copy_identifier: Option<AmCopyIdentifierFn>,
}

impl MobileDeviceLibrary {
    /// Load the framework from its well-known path.
    ///
    /// Fails with [`LibraryUnavailable`] when the binary cannot be located,
    /// which is expected on OS versions lacking the capability; callers
    /// disable the whole handheld-device subsystem in response.
    ///
    /// [`LibraryUnavailable`]: crate::MonitorError::LibraryUnavailable
    pub fn load() -> Result<Self> {
        Self::load_from(MOBILE_DEVICE_LIBRARY_PATH)
    }

    /// Load the framework from an explicit path.
    pub fn load_from(path: &str) -> Result<Self> {
        let library = unsafe { Library::new(path) }
            .map_err(|source| MonitorError::library_unavailable(path, source))?;
        info!(path, "device management library loaded");

        unsafe {
            Ok(Self {
                subscribe: resolve(&library, b"AMDeviceNotificationSubscribe\0"),
                connect: resolve(&library, b"AMDeviceConnect\0"),
                validate_pairing: resolve(&library, b"AMDeviceValidatePairing\0"),
                start_session: resolve(&library, b"AMDeviceStartSession\0"),
                stop_session: resolve(&library, b"AMDeviceStopSession\0"),
                disconnect: resolve(&library, b"AMDeviceDisconnect\0"),
                copy_value: resolve(&library, b"AMDeviceCopyValue\0"),
                copy_identifier: resolve(&library, b"AMDeviceCopyDeviceIdentifier\0"),
                _library: library,
            })
        }
    }
}

/// Resolve one symbol, degrading to `None` when this library revision does
/// not export it.
unsafe fn resolve<T: Copy>(library: &Library, symbol: &[u8]) -> Option<T> {
    match unsafe { library.get::<T>(symbol) } {
        Ok(found) => Some(*found),
        Err(_) => {
            let name = String::from_utf8_lossy(&symbol[..symbol.len().saturating_sub(1)]);
            debug!(symbol = %name, "capability not exposed by this library revision");
            None
        }
    }
}
