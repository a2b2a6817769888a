//! Native implementation of the device seams.

use std::ffi::c_void;
use std::ptr;

use core_foundation_sys::base::{CFRelease, CFTypeRef};
use tracing::{debug, trace};

use crate::mobile::{DeviceOps, EventPipeline, NotificationSource, STATUS_OK};
use crate::types::{DeviceHandle, NotificationEvent, NotificationKind, PropertyValue};
use crate::{MonitorError, Result};

use super::cf;
use super::library::{AmDeviceCallFn, MobileDeviceLibrary};

/// Notification payload delivered by the native layer.
#[repr(C)]
pub(crate) struct AmDeviceNotificationInfo {
    pub device: *mut c_void,
    pub message: u32,
    pub subscription: *mut c_void,
}

/// Status reported when this library revision does not expose the called
/// capability; the affected operation simply fails for that device.
const STATUS_CAPABILITY_ABSENT: i32 = -1;

/// [`DeviceOps`] and [`NotificationSource`] over the bound private library.
///
/// Every method is a synchronous, blocking native call that may incur USB
/// I/O latency; callers keep these off latency-sensitive threads. No
/// timeouts are enforced: a hung call blocks only that device's pipeline
/// (or subsequent deliveries, when the native layer serializes callbacks).
pub struct NativeDeviceServices {
    library: MobileDeviceLibrary,
}

impl NativeDeviceServices {
    pub fn new(library: MobileDeviceLibrary) -> Self {
        Self { library }
    }

    fn call(&self, capability: Option<AmDeviceCallFn>, name: &str, device: DeviceHandle) -> i32 {
        match capability {
            Some(f) => unsafe { f(device.as_raw()) },
            None => {
                debug!(capability = name, "capability absent; treating call as failed");
                STATUS_CAPABILITY_ABSENT
            }
        }
    }
}

impl DeviceOps for NativeDeviceServices {
    fn connect(&self, device: DeviceHandle) -> i32 {
        self.call(self.library.connect, "AMDeviceConnect", device)
    }

    fn validate_pairing(&self, device: DeviceHandle) -> i32 {
        self.call(self.library.validate_pairing, "AMDeviceValidatePairing", device)
    }

    fn start_session(&self, device: DeviceHandle) -> i32 {
        self.call(self.library.start_session, "AMDeviceStartSession", device)
    }

    fn stop_session(&self, device: DeviceHandle) -> i32 {
        self.call(self.library.stop_session, "AMDeviceStopSession", device)
    }

    fn disconnect(&self, device: DeviceHandle) -> i32 {
        self.call(self.library.disconnect, "AMDeviceDisconnect", device)
    }

    fn copy_value(
        &self,
        device: DeviceHandle,
        domain: Option<&str>,
        key: &str,
    ) -> Option<PropertyValue> {
        let copy_value = self.library.copy_value?;
        unsafe {
            let domain_cf = match domain {
                Some(domain) => cf::cf_string(domain),
                None => ptr::null(),
            };
            let key_cf = cf::cf_string(key);
            if key_cf.is_null() {
                if !domain_cf.is_null() {
                    CFRelease(domain_cf as CFTypeRef);
                }
                return None;
            }

            let value = copy_value(device.as_raw(), domain_cf, key_cf);

            CFRelease(key_cf as CFTypeRef);
            if !domain_cf.is_null() {
                CFRelease(domain_cf as CFTypeRef);
            }
            if value.is_null() {
                return None;
            }

            // The copy rule applies: we own `value` and release it after
            // decoding a Rust-owned representation.
            let decoded = cf::decode(value);
            CFRelease(value);
            decoded
        }
    }

    fn copy_identifier(&self, device: DeviceHandle) -> Option<String> {
        let copy_identifier = self.library.copy_identifier?;
        unsafe {
            let value = copy_identifier(device.as_raw());
            if value.is_null() {
                return None;
            }
            let identifier = cf::string_from_cf(value);
            CFRelease(value as CFTypeRef);
            identifier
        }
    }
}

/// Context handed to the native layer at subscribe time. Leaked on
/// purpose: the subscription delivers until process exit and the callback
/// may fire at any moment on a thread we do not control.
struct CallbackContext {
    pipeline: EventPipeline,
}

unsafe extern "C" fn notification_trampoline(
    info: *mut AmDeviceNotificationInfo,
    context: *mut c_void,
) {
    if info.is_null() || context.is_null() {
        return;
    }
    let (info, context) = unsafe { (&*info, &*(context as *const CallbackContext)) };

    match NotificationKind::from_message(info.message) {
        Some(kind) => {
            // The handle is only valid for the duration of this callback;
            // dispatch runs the whole pipeline synchronously here.
            let handle = DeviceHandle::from_raw(info.device);
            context.pipeline.dispatch(NotificationEvent { kind, handle });
        }
        None => trace!(message = info.message, "ignoring unknown notification message"),
    }
}

impl NotificationSource for NativeDeviceServices {
    fn subscribe(&self, pipeline: EventPipeline) -> Result<()> {
        let subscribe = self.library.subscribe.ok_or_else(|| {
            MonitorError::subscription_unavailable("subscribe symbol absent from library")
        })?;

        let context = Box::into_raw(Box::new(CallbackContext { pipeline }));
        let mut subscription: *mut c_void = ptr::null_mut();
        let status =
            unsafe { subscribe(notification_trampoline, 0, 0, context.cast(), &mut subscription) };

        if status != STATUS_OK {
            // The native layer rejected the registration and will never
            // call back; reclaim the context.
            drop(unsafe { Box::from_raw(context) });
            return Err(MonitorError::subscription_unavailable(format!(
                "native subscribe returned status {status:#x}"
            )));
        }

        debug!("device notification subscription registered");
        Ok(())
    }
}
