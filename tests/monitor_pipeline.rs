//! Integration tests for the handheld-device pipeline.
//!
//! A scripted notification hub stands in for the native layer, driving the
//! full path: notification event, session lifecycle, telemetry extraction,
//! registry publication.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::StreamExt;
use voltwatch::types::{
    BatteryTelemetry, DeviceHandle, NotificationEvent, NotificationKind, PropertyValue,
};
use voltwatch::{DeviceMonitor, DeviceOps, EventPipeline, MonitorError, NotificationSource};

const BATTERY_DOMAIN: &str = "com.apple.mobile.battery";

/// One scripted device behind a fake handle address.
#[derive(Default)]
struct DeviceProfile {
    identifier: Option<String>,
    values: HashMap<(Option<String>, String), PropertyValue>,
    connect_status: i32,
    validate_status: i32,
    start_status: i32,
}

impl DeviceProfile {
    fn named(identifier: &str) -> Self {
        Self { identifier: Some(identifier.to_owned()), ..Default::default() }
    }

    fn with_value(mut self, domain: Option<&str>, key: &str, value: PropertyValue) -> Self {
        self.values.insert((domain.map(str::to_owned), key.to_owned()), value);
        self
    }

    fn with_fuel_gauge(self, cycles: i64, design: i64, max: i64, current: i64) -> Self {
        let mut record = HashMap::new();
        record.insert("CycleCount".to_owned(), PropertyValue::Integer(cycles));
        record.insert("DesignCapacity".to_owned(), PropertyValue::Integer(design));
        record.insert("AppleRawMaxCapacity".to_owned(), PropertyValue::Integer(max));
        record.insert("AppleRawCurrentCapacity".to_owned(), PropertyValue::Integer(current));
        record.insert("ExternalConnected".to_owned(), PropertyValue::Boolean(true));
        self.with_value(
            Some(BATTERY_DOMAIN),
            "GasGaugeCapability",
            PropertyValue::Dictionary(record),
        )
    }
}

/// Scripted notification hub implementing both native seams.
#[derive(Default)]
struct MockHub {
    devices: Mutex<HashMap<usize, DeviceProfile>>,
    pipeline: Mutex<Option<EventPipeline>>,
    refuse_subscription: bool,
    subscribe_calls: AtomicUsize,
    connects: AtomicUsize,
    disconnects: AtomicUsize,
    session_starts: AtomicUsize,
    session_stops: AtomicUsize,
}

impl MockHub {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn refusing_subscription() -> Arc<Self> {
        Arc::new(Self { refuse_subscription: true, ..Default::default() })
    }

    fn add_device(&self, addr: usize, profile: DeviceProfile) {
        self.devices.lock().unwrap().insert(addr, profile);
    }

    fn clear_identifier(&self, addr: usize) {
        if let Some(profile) = self.devices.lock().unwrap().get_mut(&addr) {
            profile.identifier = None;
        }
    }

    /// Deliver one notification the way the native callback thread would.
    fn emit(&self, kind: NotificationKind, addr: usize) {
        let pipeline = self.pipeline.lock().unwrap();
        let pipeline = pipeline.as_ref().expect("subscription registered");
        let handle = DeviceHandle::from_raw(addr as *mut std::ffi::c_void);
        pipeline.dispatch(NotificationEvent { kind, handle });
    }

    fn with_profile<T>(&self, handle: DeviceHandle, f: impl FnOnce(&DeviceProfile) -> T) -> T {
        let devices = self.devices.lock().unwrap();
        let profile = devices
            .get(&(handle.as_raw() as usize))
            .expect("event emitted for unscripted device");
        f(profile)
    }
}

impl DeviceOps for MockHub {
    fn connect(&self, device: DeviceHandle) -> i32 {
        let status = self.with_profile(device, |p| p.connect_status);
        if status == 0 {
            self.connects.fetch_add(1, Ordering::SeqCst);
        }
        status
    }

    fn validate_pairing(&self, device: DeviceHandle) -> i32 {
        self.with_profile(device, |p| p.validate_status)
    }

    fn start_session(&self, device: DeviceHandle) -> i32 {
        let status = self.with_profile(device, |p| p.start_status);
        if status == 0 {
            self.session_starts.fetch_add(1, Ordering::SeqCst);
        }
        status
    }

    fn stop_session(&self, _device: DeviceHandle) -> i32 {
        self.session_stops.fetch_add(1, Ordering::SeqCst);
        0
    }

    fn disconnect(&self, _device: DeviceHandle) -> i32 {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        0
    }

    fn copy_value(
        &self,
        device: DeviceHandle,
        domain: Option<&str>,
        key: &str,
    ) -> Option<PropertyValue> {
        self.with_profile(device, |p| {
            p.values.get(&(domain.map(str::to_owned), key.to_owned())).cloned()
        })
    }

    fn copy_identifier(&self, device: DeviceHandle) -> Option<String> {
        self.with_profile(device, |p| p.identifier.clone())
    }
}

impl NotificationSource for MockHub {
    fn subscribe(&self, pipeline: EventPipeline) -> voltwatch::Result<()> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if self.refuse_subscription {
            return Err(MonitorError::subscription_unavailable("scripted refusal"));
        }
        *self.pipeline.lock().unwrap() = Some(pipeline);
        Ok(())
    }
}

/// Await a snapshot matching `predicate`, with a timeout guard.
async fn wait_for_snapshot(
    monitor: &DeviceMonitor,
    predicate: impl Fn(&[BatteryTelemetry]) -> bool,
) -> Arc<Vec<BatteryTelemetry>> {
    let mut snapshots = Box::pin(monitor.snapshots());
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            let devices = snapshots.next().await.expect("snapshot stream is infinite");
            if predicate(&devices) {
                return devices;
            }
        }
    })
    .await
    .expect("timed out waiting for matching snapshot")
}

#[tokio::test]
async fn connected_device_appears_with_fuel_gauge_telemetry() {
    let hub = MockHub::new();
    hub.add_device(
        0x10,
        DeviceProfile::named("udid-a")
            .with_value(None, "DeviceName", PropertyValue::String("Field iPhone".into()))
            .with_value(None, "SerialNumber", PropertyValue::String("F4GX0000".into()))
            .with_fuel_gauge(342, 3200, 2900, 2600),
    );

    let monitor = DeviceMonitor::start(Arc::clone(&hub)).expect("monitor starts");
    assert!(monitor.devices().is_empty());

    hub.emit(NotificationKind::Connected, 0x10);
    let devices = wait_for_snapshot(&monitor, |devices| devices.len() == 1).await;

    let device = &devices[0];
    assert_eq!(device.identifier, "udid-a");
    assert_eq!(device.display_name, "Field iPhone");
    assert_eq!(device.cycle_count, 342);
    assert_eq!(device.design_capacity_mah, 3200);
    assert_eq!(device.max_capacity_mah, 2900);
    assert_eq!(device.current_capacity_mah, 2600);
    assert!(device.is_charging);
    assert_eq!(device.level_percent, 90);
    assert!((device.health_percent() - 90.625).abs() < 0.01);
}

#[tokio::test]
async fn percentage_only_firmware_reports_level_directly() {
    let hub = MockHub::new();
    hub.add_device(
        0x20,
        DeviceProfile::named("udid-b")
            .with_value(None, "ProductType", PropertyValue::String("iPhone14,2".into()))
            .with_value(
                Some(BATTERY_DOMAIN),
                "BatteryCurrentCapacity",
                PropertyValue::Integer(85),
            ),
    );

    let monitor = DeviceMonitor::start(Arc::clone(&hub)).expect("monitor starts");
    hub.emit(NotificationKind::Connected, 0x20);

    let devices = wait_for_snapshot(&monitor, |devices| devices.len() == 1).await;
    let device = &devices[0];
    assert_eq!(device.level_percent, 85);
    // Max never resolved; design comes from the model table so health math
    // stays guarded
    assert_eq!(device.max_capacity_mah, 0);
    assert_eq!(device.design_capacity_mah, 3095);
    assert!((0.0..=100.0).contains(&device.health_percent()));
}

#[tokio::test]
async fn disconnect_removes_the_identified_device() {
    let hub = MockHub::new();
    hub.add_device(0x30, DeviceProfile::named("udid-a").with_fuel_gauge(10, 3000, 2900, 1450));
    hub.add_device(0x31, DeviceProfile::named("udid-b").with_fuel_gauge(20, 3000, 2800, 2100));

    let monitor = DeviceMonitor::start(Arc::clone(&hub)).expect("monitor starts");
    hub.emit(NotificationKind::Connected, 0x30);
    hub.emit(NotificationKind::Connected, 0x31);
    wait_for_snapshot(&monitor, |devices| devices.len() == 2).await;

    hub.emit(NotificationKind::Disconnected, 0x30);
    let devices = wait_for_snapshot(&monitor, |devices| devices.len() == 1).await;
    assert_eq!(devices[0].identifier, "udid-b");
}

#[tokio::test]
async fn failed_identifier_read_on_disconnect_leaves_entry_stale() {
    let hub = MockHub::new();
    hub.add_device(0x40, DeviceProfile::named("udid-a").with_fuel_gauge(10, 3000, 2900, 1450));

    let monitor = DeviceMonitor::start(Arc::clone(&hub)).expect("monitor starts");
    hub.emit(NotificationKind::Connected, 0x40);
    wait_for_snapshot(&monitor, |devices| devices.len() == 1).await;

    // The handle becomes unreliable before the identifier could be read
    hub.clear_identifier(0x40);
    hub.emit(NotificationKind::Disconnected, 0x40);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let devices = monitor.devices();
    assert_eq!(devices.len(), 1, "entry is deliberately retained");
    assert_eq!(devices[0].identifier, "udid-a");
}

#[tokio::test]
async fn repeated_connects_never_grow_the_registry() {
    let hub = MockHub::new();
    hub.add_device(0x50, DeviceProfile::named("udid-a").with_fuel_gauge(10, 3000, 2900, 1450));

    let monitor = DeviceMonitor::start(Arc::clone(&hub)).expect("monitor starts");
    for _ in 0..4 {
        hub.emit(NotificationKind::Connected, 0x50);
    }

    let devices = wait_for_snapshot(&monitor, |devices| !devices.is_empty()).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(devices.len(), 1);
    assert_eq!(monitor.devices().len(), 1);
}

#[tokio::test]
async fn untrusted_device_never_appears_and_still_disconnects() {
    let hub = MockHub::new();
    let mut profile = DeviceProfile::named("udid-a").with_fuel_gauge(10, 3000, 2900, 1450);
    profile.validate_status = -402653085;
    hub.add_device(0x60, profile);

    let monitor = DeviceMonitor::start(Arc::clone(&hub)).expect("monitor starts");
    hub.emit(NotificationKind::Connected, 0x60);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(monitor.devices().is_empty());

    // Symmetric cleanup ran despite the early abort
    assert_eq!(hub.connects.load(Ordering::SeqCst), 1);
    assert_eq!(hub.disconnects.load(Ordering::SeqCst), 1);
    assert_eq!(hub.session_starts.load(Ordering::SeqCst), 0);
    assert_eq!(hub.session_stops.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn session_calls_balance_across_mixed_traces() {
    let hub = MockHub::new();
    hub.add_device(0x70, DeviceProfile::named("udid-a").with_fuel_gauge(10, 3000, 2900, 1450));
    let mut untrusted = DeviceProfile::named("udid-b");
    untrusted.validate_status = -1;
    hub.add_device(0x71, untrusted);
    let mut no_session = DeviceProfile::named("udid-c");
    no_session.start_status = -1;
    hub.add_device(0x72, no_session);

    let monitor = DeviceMonitor::start(Arc::clone(&hub)).expect("monitor starts");
    hub.emit(NotificationKind::Connected, 0x70);
    hub.emit(NotificationKind::Connected, 0x71);
    hub.emit(NotificationKind::Connected, 0x72);
    hub.emit(NotificationKind::Connected, 0x70);

    wait_for_snapshot(&monitor, |devices| devices.len() == 1).await;

    // Every successful connect matched by exactly one disconnect
    assert_eq!(hub.connects.load(Ordering::SeqCst), 4);
    assert_eq!(hub.disconnects.load(Ordering::SeqCst), 4);
    // Every successful session start matched by exactly one stop
    assert_eq!(hub.session_starts.load(Ordering::SeqCst), 2);
    assert_eq!(hub.session_stops.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn unsubscribe_notification_is_advisory_only() {
    let hub = MockHub::new();
    hub.add_device(0x80, DeviceProfile::named("udid-a").with_fuel_gauge(10, 3000, 2900, 1450));

    let monitor = DeviceMonitor::start(Arc::clone(&hub)).expect("monitor starts");
    hub.emit(NotificationKind::Connected, 0x80);
    wait_for_snapshot(&monitor, |devices| devices.len() == 1).await;

    hub.emit(NotificationKind::Unsubscribed, 0x80);
    tokio::time::sleep(Duration::from_millis(50)).await;

    // No resubscription attempt and no registry change
    assert_eq!(hub.subscribe_calls.load(Ordering::SeqCst), 1);
    assert_eq!(monitor.devices().len(), 1);
}

#[tokio::test]
async fn subscription_refusal_is_fatal_and_not_retried() {
    let hub = MockHub::refusing_subscription();

    let error = DeviceMonitor::start(Arc::clone(&hub)).expect_err("start fails");
    assert!(matches!(error, MonitorError::SubscriptionUnavailable { .. }));
    assert!(error.is_subsystem_fatal());
    assert_eq!(hub.subscribe_calls.load(Ordering::SeqCst), 1, "no retry loop");
}

#[cfg(target_os = "macos")]
#[test]
fn absent_library_reports_library_unavailable_once() {
    use voltwatch::macos::MobileDeviceLibrary;

    let error = MobileDeviceLibrary::load_from("/nonexistent/MobileDevice")
        .expect_err("load fails");
    assert!(matches!(error, MonitorError::LibraryUnavailable { .. }));
    assert!(error.is_subsystem_fatal());
}
