//! The per-device telemetry record published by the registry.

use serde::{Deserialize, Serialize};

/// Battery telemetry for one handheld device.
///
/// Produced by the extraction pipeline each time a device connects, and
/// replaced wholesale on reconnect. The `identifier` is the stable hardware
/// UUID and the sole registry key; it survives reconnects while the native
/// handle does not.
///
/// When the firmware only reports a percentage (observed `max <= 100`), the
/// capacity fields hold the raw percentage readings rather than
/// milliamp-hours and no mAh figures are displayable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatteryTelemetry {
    /// Stable hardware UUID; registry key.
    pub identifier: String,
    pub display_name: String,
    pub serial_number: String,
    /// Hardware model code, e.g. `iPhone14,2`.
    pub model_identifier: String,
    pub cycle_count: u32,
    /// Factory-nominal full-charge capacity in mAh. Never left at zero when
    /// any capacity figure or model estimate was available.
    pub design_capacity_mah: u32,
    pub current_capacity_mah: u32,
    pub max_capacity_mah: u32,
    /// Charge level, always within 0..=100.
    pub level_percent: u8,
    pub is_charging: bool,
    /// Which extraction strategies matched and the raw values observed.
    /// Informational only; never feeds back into control flow.
    pub diagnostic_trail: Vec<String>,
}

impl BatteryTelemetry {
    /// Battery health as `max / design * 100`, clamped to 0..=100.
    ///
    /// Returns 0 when the design capacity is unknown, so callers never hit a
    /// division fault.
    pub fn health_percent(&self) -> f64 {
        if self.design_capacity_mah == 0 {
            return 0.0;
        }
        let health =
            f64::from(self.max_capacity_mah) / f64::from(self.design_capacity_mah) * 100.0;
        health.clamp(0.0, 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn telemetry(design: u32, max: u32) -> BatteryTelemetry {
        BatteryTelemetry {
            identifier: "00008120-000A1D4C0E8A002E".into(),
            display_name: "Test iPhone".into(),
            serial_number: "F4GX0000PLJM".into(),
            model_identifier: "iPhone14,2".into(),
            cycle_count: 0,
            design_capacity_mah: design,
            current_capacity_mah: 0,
            max_capacity_mah: max,
            level_percent: 0,
            is_charging: false,
            diagnostic_trail: Vec::new(),
        }
    }

    #[test]
    fn health_is_zero_when_design_unknown() {
        assert_eq!(telemetry(0, 2900).health_percent(), 0.0);
    }

    #[test]
    fn health_is_ratio_of_max_to_design() {
        let health = telemetry(3095, 2790).health_percent();
        assert!((health - 90.145).abs() < 0.01);
    }

    #[test]
    fn health_is_capped_at_hundred() {
        // Fresh batteries can report max above design
        assert_eq!(telemetry(3000, 3100).health_percent(), 100.0);
    }

    proptest! {
        #[test]
        fn health_never_faults_and_stays_in_range(
            design in 0u32..=10_000,
            max in 0u32..=10_000
        ) {
            let health = telemetry(design, max).health_percent();
            prop_assert!((0.0..=100.0).contains(&health));
        }
    }
}
