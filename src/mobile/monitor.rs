//! The notification hub: event pipeline, registry task, and public monitor.

use std::sync::Arc;

use futures::Stream;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::Result;
use crate::types::{BatteryTelemetry, NotificationEvent, NotificationKind};

use super::extract;
use super::registry::{self, RegistryCommand};
use super::services::{DeviceOps, NotificationSource};

/// Receives decoded notification events from the native callback thread and
/// drives the per-device pipeline.
///
/// [`dispatch`](EventPipeline::dispatch) runs synchronously in callback
/// context: the device handle is only valid there, and the native calls are
/// blocking anyway. Only typed results cross into the registry task, through
/// an unbounded channel; the callback never touches presentation-facing
/// state. If the native layer serializes callback delivery, a slow pipeline
/// delays subsequent events for other devices; that trade-off is accepted
/// rather than worked around.
pub struct EventPipeline {
    ops: Arc<dyn DeviceOps>,
    commands: mpsc::UnboundedSender<RegistryCommand>,
}

impl EventPipeline {
    pub(crate) fn new(
        ops: Arc<dyn DeviceOps>,
        commands: mpsc::UnboundedSender<RegistryCommand>,
    ) -> Self {
        Self { ops, commands }
    }

    /// Handle one notification event. Must be called with the handle still
    /// valid, i.e. from within the delivering callback.
    pub fn dispatch(&self, event: NotificationEvent) {
        match event.kind {
            NotificationKind::Connected => {
                match extract::read_device(self.ops.as_ref(), event.handle) {
                    Ok(telemetry) => {
                        info!(
                            identifier = %telemetry.identifier,
                            name = %telemetry.display_name,
                            level = telemetry.level_percent,
                            "device connected"
                        );
                        let _ = self.commands.send(RegistryCommand::Upsert(telemetry));
                    }
                    Err(error) => {
                        // Per-device failure: this device just does not
                        // appear or update this cycle.
                        debug!(%error, "device pipeline failed");
                    }
                }
            }
            NotificationKind::Disconnected => {
                // The handle becomes unreliable immediately; the identifier
                // query is the lightest possible read and needs no session.
                match self.ops.copy_identifier(event.handle) {
                    Some(identifier) => {
                        info!(%identifier, "device disconnected");
                        let _ = self.commands.send(RegistryCommand::Remove(identifier));
                    }
                    None => {
                        // Accepted limitation: without an identifier the
                        // entry stays in the registry until it reconnects.
                        debug!("identifier unreadable on disconnect; entry left stale");
                    }
                }
            }
            NotificationKind::Unsubscribed => {
                warn!("device notification subscription ended; no resubscription is attempted");
            }
        }
    }
}

/// Live monitor for tethered handheld devices.
///
/// Holds the receiving end of the registry's snapshot channel and the
/// cancellation token for the registry task. The native subscription itself
/// is process-lifetime and outlives this value.
#[derive(Debug)]
pub struct DeviceMonitor {
    snapshots: watch::Receiver<Arc<Vec<BatteryTelemetry>>>,
    cancel: CancellationToken,
}

impl DeviceMonitor {
    /// Subscribe to device notifications and start the registry task.
    ///
    /// `services` is the native binding (or a mock in tests). On failure the
    /// whole subsystem is unavailable: the error is subsystem-fatal and
    /// callers present an empty device list without retrying.
    ///
    /// Must be called from within a Tokio runtime; the registry task is
    /// spawned onto it.
    pub fn start<S>(services: Arc<S>) -> Result<Self>
    where
        S: DeviceOps + NotificationSource + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Arc::new(Vec::new()));
        let cancel = CancellationToken::new();

        tokio::spawn(registry::registry_task(command_rx, snapshot_tx, cancel.clone()));

        let pipeline = EventPipeline::new(Arc::clone(&services) as Arc<dyn DeviceOps>, command_tx);
        services.subscribe(pipeline)?;

        info!("device monitor started");
        Ok(Self { snapshots: snapshot_rx, cancel })
    }

    /// The current device snapshot.
    pub fn devices(&self) -> Arc<Vec<BatteryTelemetry>> {
        self.snapshots.borrow().clone()
    }

    /// Push-style snapshot stream for presentation layers.
    ///
    /// Yields the current snapshot immediately, then every change. The
    /// stream is infinite and restartable only by calling this again;
    /// delivery execution context is the consumer's choice.
    pub fn snapshots(&self) -> impl Stream<Item = Arc<Vec<BatteryTelemetry>>> + 'static {
        WatchStream::new(self.snapshots.clone())
    }
}

impl Drop for DeviceMonitor {
    fn drop(&mut self) {
        debug!("dropping device monitor");
        // Stops the registry task; the native subscription has no teardown.
        self.cancel.cancel();
    }
}
