//! Host computer battery reader.
//!
//! A single synchronous property-bag query keyed by the smart battery
//! service name, plus a fixed-interval polling stream for presentation
//! layers (the reference cadence is one poll every two seconds).

use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{trace, warn};

use crate::Result;
use crate::types::{PropertyBag, PropertyValue};

/// IOKit service name the property bag is queried from.
pub const SMART_BATTERY_SERVICE: &str = "AppleSmartBattery";

/// Default presentation polling interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Sentinel the firmware reports while time-remaining is unknown or still
/// being calculated.
const TIME_REMAINING_UNKNOWN: i64 = 65535;

/// One synchronous property-bag query against the host's smart battery
/// service.
pub trait PowerSource: Send + Sync {
    fn battery_properties(&self) -> Result<PropertyBag>;
}

/// A snapshot of host battery state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HostBatteryStats {
    pub current_capacity_mah: u32,
    pub max_capacity_mah: u32,
    /// Defaults to max when the firmware withholds it, so health math never
    /// divides by zero.
    pub design_capacity_mah: u32,
    pub cycle_count: u32,
    pub voltage_mv: u32,
    /// Negative while discharging.
    pub amperage_ma: i32,
    pub is_charging: bool,
    pub temperature_c: f64,
    /// Minutes to full (charging) or to empty (discharging); `None` while
    /// the firmware is still calculating.
    pub time_remaining_minutes: Option<u32>,
}

impl HostBatteryStats {
    /// Battery health as `max / design * 100`; 100 when design is unknown.
    pub fn health_percent(&self) -> f64 {
        if self.design_capacity_mah == 0 {
            return 100.0;
        }
        f64::from(self.max_capacity_mah) / f64::from(self.design_capacity_mah) * 100.0
    }

    /// Instantaneous power draw in watts (negative while discharging).
    pub fn watts(&self) -> f64 {
        f64::from(self.voltage_mv) * f64::from(self.amperage_ma) / 1_000_000.0
    }

    /// Decode a smart battery property bag.
    ///
    /// Raw (unscaled) capacity keys are preferred over the vendor-scaled
    /// variants; temperature arrives in hundredths of a degree Celsius; the
    /// time-remaining sentinels (65535 and -1) fall back to the
    /// charging-state-appropriate average/instant keys before resolving to
    /// unknown.
    pub fn from_properties(props: &PropertyBag) -> Self {
        let int = |key: &str| props.get(key).and_then(PropertyValue::as_i64);

        let current_capacity =
            int("AppleRawCurrentCapacity").or_else(|| int("CurrentCapacity")).unwrap_or(0);
        let max_capacity =
            int("AppleRawMaxCapacity").or_else(|| int("MaxCapacity")).unwrap_or(0);
        let design_capacity = int("DesignCapacity").unwrap_or(0);
        let cycle_count = int("CycleCount").unwrap_or(0);
        let voltage = int("Voltage").unwrap_or(0);
        let amperage = int("Amperage").unwrap_or(0);
        let is_charging =
            props.get("IsCharging").and_then(PropertyValue::as_bool).unwrap_or(false);
        let temperature_c = int("Temperature").unwrap_or(0) as f64 / 100.0;

        let mut time_remaining = int("TimeRemaining").unwrap_or(-1);
        if time_remaining == TIME_REMAINING_UNKNOWN || time_remaining == -1 {
            time_remaining = if is_charging {
                int("AvgTimeToFull").or_else(|| int("InstantTimeToFull")).unwrap_or(-1)
            } else {
                int("AvgTimeToEmpty").or_else(|| int("InstantTimeToEmpty")).unwrap_or(-1)
            };
        }
        let time_remaining_minutes = match time_remaining {
            t if t < 0 || t == TIME_REMAINING_UNKNOWN => None,
            t => Some(t.min(i64::from(u32::MAX)) as u32),
        };

        Self {
            current_capacity_mah: saturate(current_capacity),
            max_capacity_mah: saturate(max_capacity),
            design_capacity_mah: if design_capacity == 0 {
                saturate(max_capacity)
            } else {
                saturate(design_capacity)
            },
            cycle_count: saturate(cycle_count),
            voltage_mv: saturate(voltage),
            amperage_ma: amperage.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32,
            is_charging,
            temperature_c,
            time_remaining_minutes,
        }
    }
}

fn saturate(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

/// Reader over a [`PowerSource`].
pub struct HostBatteryReader {
    source: Arc<dyn PowerSource>,
}

impl HostBatteryReader {
    pub fn new(source: Arc<dyn PowerSource>) -> Self {
        Self { source }
    }

    /// One-shot query of the current host battery state.
    pub fn stats(&self) -> Result<HostBatteryStats> {
        let props = self.source.battery_properties()?;
        trace!(keys = props.len(), "host battery property bag read");
        Ok(HostBatteryStats::from_properties(&props))
    }

    /// Fixed-interval polling stream.
    ///
    /// Query failures are logged and skip that tick; the stream itself never
    /// ends, matching the lifetime of the presentation layer that consumes
    /// it.
    pub fn poll(&self, period: Duration) -> impl Stream<Item = HostBatteryStats> + 'static {
        let source = Arc::clone(&self.source);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        futures::stream::unfold((source, ticker), |(source, mut ticker)| async move {
            loop {
                ticker.tick().await;
                match source.battery_properties() {
                    Ok(props) => {
                        let stats = HostBatteryStats::from_properties(&props);
                        return Some((stats, (source, ticker)));
                    }
                    Err(error) => {
                        warn!(%error, "host battery query failed; retrying next tick");
                    }
                }
            }
        })
    }
}
