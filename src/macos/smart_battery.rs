//! IOKit power source for the host battery.

use std::ffi::{CStr, c_char};
use std::ptr;

use core_foundation_sys::base::{CFAllocatorRef, CFRelease, CFTypeRef, kCFAllocatorDefault};
use core_foundation_sys::dictionary::CFMutableDictionaryRef;
use tracing::trace;

use crate::host::PowerSource;
use crate::types::{PropertyBag, PropertyValue};
use crate::{MonitorError, Result};

use super::cf;

#[allow(non_camel_case_types)]
type kern_return_t = i32;
#[allow(non_camel_case_types)]
type mach_port_t = u32;
#[allow(non_camel_case_types)]
type io_object_t = u32;
#[allow(non_camel_case_types)]
type io_service_t = io_object_t;

#[link(name = "IOKit", kind = "framework")]
unsafe extern "C" {
    fn IOServiceNameMatching(name: *const c_char) -> CFMutableDictionaryRef;
    fn IOServiceGetMatchingService(
        main_port: mach_port_t,
        matching: CFMutableDictionaryRef,
    ) -> io_service_t;
    fn IORegistryEntryCreateCFProperties(
        entry: io_service_t,
        properties: *mut CFMutableDictionaryRef,
        allocator: CFAllocatorRef,
        options: u32,
    ) -> kern_return_t;
    fn IOObjectRelease(object: io_object_t) -> kern_return_t;
}

/// `kIOMainPortDefault`: zero requests the default main port.
const IO_MAIN_PORT_DEFAULT: mach_port_t = 0;

const SERVICE_NAME: &CStr = c"AppleSmartBattery";

struct ServiceGuard(io_service_t);

impl Drop for ServiceGuard {
    fn drop(&mut self) {
        unsafe {
            IOObjectRelease(self.0);
        }
    }
}

/// [`PowerSource`] querying the `AppleSmartBattery` registry service.
pub struct SmartBatterySource;

impl PowerSource for SmartBatterySource {
    fn battery_properties(&self) -> Result<PropertyBag> {
        unsafe {
            let matching = IOServiceNameMatching(SERVICE_NAME.as_ptr());
            if matching.is_null() {
                return Err(MonitorError::host_battery("matching dictionary allocation failed"));
            }

            // The matching dictionary is consumed by the lookup
            let service = IOServiceGetMatchingService(IO_MAIN_PORT_DEFAULT, matching);
            if service == 0 {
                return Err(MonitorError::host_battery("AppleSmartBattery service not found"));
            }
            let _service = ServiceGuard(service);

            let mut props: CFMutableDictionaryRef = ptr::null_mut();
            let status =
                IORegistryEntryCreateCFProperties(service, &mut props, kCFAllocatorDefault, 0);
            if status != 0 || props.is_null() {
                return Err(MonitorError::host_battery(format!(
                    "property query failed with status {status:#x}"
                )));
            }

            let decoded = cf::decode(props as CFTypeRef);
            CFRelease(props as CFTypeRef);

            match decoded {
                Some(PropertyValue::Dictionary(bag)) => {
                    trace!(keys = bag.len(), "smart battery properties read");
                    Ok(bag)
                }
                _ => Err(MonitorError::host_battery("property bag was not a dictionary")),
            }
        }
    }
}
