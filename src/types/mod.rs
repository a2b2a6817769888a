//! Core types for battery telemetry representation.
//!
//! This module provides the foundational data structures shared across the
//! handheld-device pipeline and the host battery reader:
//!
//! - [`BatteryTelemetry`] is the per-device record published by the registry
//! - [`DeviceHandle`] / [`NotificationEvent`] model the native notification
//!   layer's opaque tokens and attach/detach messages
//! - [`PropertyValue`] is the plist-like value vocabulary every native
//!   property query is decoded into

mod event;
mod property;
mod telemetry;

pub use event::{DeviceHandle, NotificationEvent, NotificationKind};
pub use property::{PropertyBag, PropertyValue};
pub use telemetry::BatteryTelemetry;
