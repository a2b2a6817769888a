//! macOS bindings: the private device-management framework and IOKit.
//!
//! Everything in here talks to native code. The platform-neutral pipeline
//! in [`crate::mobile`] and [`crate::host`] only ever sees the seam traits
//! these types implement.

mod cf;
mod device;
mod library;
mod smart_battery;

pub use device::NativeDeviceServices;
pub use library::{MOBILE_DEVICE_LIBRARY_PATH, MobileDeviceLibrary};
pub use smart_battery::SmartBatterySource;
