//! The identifier-keyed telemetry registry and its snapshot publication.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

use crate::types::BatteryTelemetry;

/// Mutations applied to the registry, funneled from notification callbacks
/// through a single channel so the registry stays single-writer.
#[derive(Debug)]
pub(crate) enum RegistryCommand {
    /// Replace-or-insert the record keyed by its identifier.
    Upsert(BatteryTelemetry),
    /// Best-effort removal by identifier.
    Remove(String),
}

/// Identifier → telemetry map with full-snapshot publication.
///
/// Owned by exactly one task; every change publishes a complete sorted
/// snapshot through the watch channel so late subscribers always see the
/// current device list immediately.
pub(crate) struct DeviceRegistry {
    entries: HashMap<String, BatteryTelemetry>,
    snapshots: watch::Sender<Arc<Vec<BatteryTelemetry>>>,
}

impl DeviceRegistry {
    pub(crate) fn new(snapshots: watch::Sender<Arc<Vec<BatteryTelemetry>>>) -> Self {
        Self { entries: HashMap::new(), snapshots }
    }

    fn publish(&self) {
        let mut devices: Vec<BatteryTelemetry> = self.entries.values().cloned().collect();
        devices.sort_by(|a, b| a.identifier.cmp(&b.identifier));
        // Send errors only mean every subscriber is gone; keep the state
        // current for the next subscription anyway.
        let _ = self.snapshots.send(Arc::new(devices));
    }

    pub(crate) fn apply(&mut self, command: RegistryCommand) {
        match command {
            RegistryCommand::Upsert(telemetry) => {
                trace!(identifier = %telemetry.identifier, "registry upsert");
                self.entries.insert(telemetry.identifier.clone(), telemetry);
                self.publish();
            }
            RegistryCommand::Remove(identifier) => {
                if self.entries.remove(&identifier).is_some() {
                    debug!(%identifier, "device removed from registry");
                    self.publish();
                } else {
                    trace!(%identifier, "remove for unknown identifier ignored");
                }
            }
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Registry task: the single synchronization point for all mutation.
///
/// Runs until the command channel closes or the token is cancelled. The
/// native subscription itself has no teardown; this only stops our side.
pub(crate) async fn registry_task(
    mut commands: mpsc::UnboundedReceiver<RegistryCommand>,
    snapshots: watch::Sender<Arc<Vec<BatteryTelemetry>>>,
    cancel: CancellationToken,
) {
    let mut registry = DeviceRegistry::new(snapshots);
    info!("device registry task started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("registry task cancelled");
                break;
            }
            command = commands.recv() => match command {
                Some(command) => registry.apply(command),
                None => {
                    debug!("registry command channel closed");
                    break;
                }
            },
        }
    }

    info!("device registry task ended");
}
