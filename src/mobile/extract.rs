//! Telemetry assembly from an active device session.
//!
//! Firmware and OS revisions disagree about where battery figures live, so
//! extraction walks an ordered fallback chain. Each strategy fills only the
//! fields still unset by the strategies before it:
//!
//! 1. The composite fuel-gauge record (`GasGaugeCapability`), preferring raw
//!    unscaled capacities over vendor-scaled variants
//! 2. The secondary composite record (`IOBatteryInfo`)
//! 3. Individual scalar keys, domain-scoped first, then unscoped
//! 4. A static model-identifier table for design capacity, falling back to
//!    the observed max so the figure is never left at zero
//!
//! Every run appends the strategies that matched and the raw values
//! observed to the record's diagnostic trail.

use tracing::debug;

use crate::types::{BatteryTelemetry, DeviceHandle, PropertyBag, PropertyValue};
use crate::{MonitorError, Result};

use super::services::DeviceOps;
use super::session::DeviceSession;

/// Domain under which the device-management library scopes battery keys.
pub const BATTERY_DOMAIN: &str = "com.apple.mobile.battery";

/// Open a session on `handle` and extract a full telemetry record.
///
/// This is the whole per-device pipeline: the session guard handles the
/// acquire/release protocol, extraction runs strictly while the session is
/// active, and teardown happens before this function returns.
pub fn read_device(ops: &dyn DeviceOps, handle: DeviceHandle) -> Result<BatteryTelemetry> {
    let session = DeviceSession::open(ops, handle)?;
    extract(&session)
}

/// Assemble a [`BatteryTelemetry`] record from an active session.
///
/// Fails with [`IncompleteTelemetry`] only when the hardware identifier
/// cannot be read; every other field degrades individually.
///
/// [`IncompleteTelemetry`]: crate::MonitorError::IncompleteTelemetry
pub fn extract(session: &DeviceSession<'_>) -> Result<BatteryTelemetry> {
    let identifier = session.identifier().ok_or(MonitorError::IncompleteTelemetry)?;

    let display_name = session
        .copy_value(None, "DeviceName")
        .and_then(PropertyValue::into_string)
        .unwrap_or_else(|| "Unknown device".to_owned());
    let serial_number = session
        .copy_value(None, "SerialNumber")
        .and_then(PropertyValue::into_string)
        .unwrap_or_else(|| "Unknown".to_owned());
    let model_identifier = session
        .copy_value(None, "ProductType")
        .and_then(PropertyValue::into_string)
        .unwrap_or_default();

    let mut trail = Vec::new();
    let mut cycle_count: i64 = 0;
    let mut design: i64 = 0;
    let mut max: i64 = 0;
    let mut current: i64 = 0;
    let mut charging = false;

    // Strategy 1: the composite fuel-gauge record. Raw capacities win over
    // the vendor-scaled variants when both are present.
    if let Some(gauge) = session
        .copy_value(Some(BATTERY_DOMAIN), "GasGaugeCapability")
        .and_then(PropertyValue::into_dict)
    {
        cycle_count = int(&gauge, "CycleCount").unwrap_or(0);
        design = int(&gauge, "DesignCapacity").unwrap_or(0);
        max = int(&gauge, "AppleRawMaxCapacity")
            .or_else(|| int(&gauge, "AppleMaxCapacity"))
            .unwrap_or(0);
        current = int(&gauge, "AppleRawCurrentCapacity")
            .or_else(|| int(&gauge, "AppleCurrentCapacity"))
            .unwrap_or(0);
        charging = boolean(&gauge, "ExternalConnected").unwrap_or(false);
        trail.push(format!(
            "fuel gauge: cycles={cycle_count} design={design} max={max} current={current} external={charging}"
        ));
    }

    // Strategy 2: the secondary composite record, filling what is still unset.
    if max == 0
        && let Some(info) = session
            .copy_value(Some(BATTERY_DOMAIN), "IOBatteryInfo")
            .and_then(PropertyValue::into_dict)
    {
        if cycle_count == 0 {
            cycle_count = int(&info, "CycleCount").unwrap_or(cycle_count);
        }
        max = int(&info, "Capacity").unwrap_or(max);
        current = int(&info, "CurrentCapacity").unwrap_or(current);
        charging = boolean(&info, "ExternalConnected").unwrap_or(charging);
        trail.push(format!(
            "battery info: cycles={cycle_count} max={max} current={current} external={charging}"
        ));
    }

    // Strategy 3: individual scalar keys, the last resort on OS versions
    // that hide the composite records.
    if cycle_count == 0
        && let Some(value) = scalar_i64(session, "CycleCount")
    {
        cycle_count = value;
        trail.push(format!("scalar CycleCount={value}"));
    }
    if max == 0
        && let Some(value) = scalar_i64(session, "BatteryMaximumCapacity")
    {
        max = value;
        trail.push(format!("scalar BatteryMaximumCapacity={value}"));
    }
    if current == 0
        && let Some(value) = scalar_i64(session, "BatteryCurrentCapacity")
    {
        current = value;
        trail.push(format!("scalar BatteryCurrentCapacity={value}"));
    }
    if !charging
        && let Some(value) = scalar_bool(session, "BatteryIsCharging")
    {
        charging = value;
        trail.push(format!("scalar BatteryIsCharging={value}"));
    }

    // Step 4: design capacity must not stay at zero while any capacity
    // figure is known, or health computation would divide by zero.
    if design == 0 {
        if let Some(estimate) = design_capacity_estimate(&model_identifier) {
            design = i64::from(estimate);
            trail.push(format!("design estimated from model table ({model_identifier}): {design}"));
        } else {
            design = max;
            if design > 0 {
                trail.push(format!("design defaulted to observed max: {design}"));
            }
        }
    }

    // Readings above 100 are milliamp-hour capacities; at or below 100 the
    // current figure already is a percentage and no mAh values exist.
    let level = if max > 100 {
        ((current as f64 / max as f64) * 100.0).round() as i64
    } else {
        current
    };
    let level_percent = level.clamp(0, 100) as u8;

    let telemetry = BatteryTelemetry {
        identifier,
        display_name,
        serial_number,
        model_identifier,
        cycle_count: saturate_u32(cycle_count),
        design_capacity_mah: saturate_u32(design),
        current_capacity_mah: saturate_u32(current),
        max_capacity_mah: saturate_u32(max),
        level_percent,
        is_charging: charging,
        diagnostic_trail: trail,
    };

    debug!(
        identifier = %telemetry.identifier,
        level = telemetry.level_percent,
        charging = telemetry.is_charging,
        "extracted device telemetry"
    );

    Ok(telemetry)
}

/// Nominal design capacities in mAh for known hardware models.
///
/// Best-effort figures for devices whose firmware withholds
/// `DesignCapacity`; unrecognized models fall back to the observed max.
pub fn design_capacity_estimate(model_identifier: &str) -> Option<u32> {
    let capacity = match model_identifier {
        "iPhone16,2" => 4441,
        "iPhone16,1" => 3290,
        "iPhone15,5" | "iPhone15,4" | "iPhone15,3" => 4323,
        "iPhone15,2" => 3200,
        "iPhone14,8" => 4325,
        "iPhone14,7" => 3227,
        "iPhone14,3" => 4352,
        "iPhone14,2" => 3095,
        "iPhone14,5" => 3227,
        "iPhone14,4" => 2406,
        "iPhone13,4" => 3687,
        "iPhone13,3" | "iPhone13,2" => 2815,
        "iPhone13,1" => 2227,
        "iPhone12,1" => 3110,
        "iPhone12,3" => 3046,
        "iPhone12,5" => 3969,
        "iPhone11,2" => 2658,
        "iPhone11,4" | "iPhone11,6" => 3174,
        "iPhone11,8" => 2942,
        "iPhone10,3" | "iPhone10,6" => 2716,
        _ => return None,
    };
    Some(capacity)
}

fn int(bag: &PropertyBag, key: &str) -> Option<i64> {
    bag.get(key).and_then(PropertyValue::as_i64)
}

fn boolean(bag: &PropertyBag, key: &str) -> Option<bool> {
    bag.get(key).and_then(PropertyValue::as_bool)
}

fn scalar_i64(session: &DeviceSession<'_>, key: &str) -> Option<i64> {
    session
        .copy_value(Some(BATTERY_DOMAIN), key)
        .or_else(|| session.copy_value(None, key))
        .and_then(|value| value.as_i64())
}

fn scalar_bool(session: &DeviceSession<'_>, key: &str) -> Option<bool> {
    session
        .copy_value(Some(BATTERY_DOMAIN), key)
        .or_else(|| session.copy_value(None, key))
        .and_then(|value| value.as_bool())
}

fn saturate_u32(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}
