//! On-disk battery level history.
//!
//! Keeps a 24-hour rolling time series of level% samples per device,
//! persisted as a keyed JSON structure. Sampling is deliberately sparse: a
//! new point is accepted only when the level changed since the last sample
//! or at least ten minutes elapsed, which captures every transition without
//! flooding storage at the polling cadence.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{MonitorError, Result};

/// How long samples are retained.
pub const RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Minimum spacing between samples at an unchanged level.
pub const MIN_SAMPLE_GAP: Duration = Duration::from_secs(10 * 60);

/// One level sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub timestamp: SystemTime,
    pub level_percent: u8,
}

/// Durable per-device level history.
///
/// All mutation is serialized through an interior mutex; the store is cheap
/// enough to share behind an `Arc` between the host poller and the device
/// snapshot consumer.
pub struct HistoryStore {
    path: PathBuf,
    series: Mutex<HashMap<String, Vec<HistoryPoint>>>,
}

impl HistoryStore {
    /// Open a store at `path`, loading any existing series.
    ///
    /// A missing or unreadable file simply starts the store empty; history
    /// is an auxiliary record and never blocks monitoring.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let series = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(series) => series,
                Err(error) => {
                    warn!(path = %path.display(), %error, "history file corrupt; starting empty");
                    HashMap::new()
                }
            },
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(error) => {
                warn!(path = %path.display(), %error, "history file unreadable; starting empty");
                HashMap::new()
            }
        };

        Self { path, series: Mutex::new(series) }
    }

    /// Record a level sample for `device_id`, pruning anything older than
    /// the retention window and persisting when the sample is accepted.
    pub fn record(&self, device_id: &str, level_percent: u8) -> Result<()> {
        self.record_at(device_id, level_percent, SystemTime::now())
    }

    fn record_at(&self, device_id: &str, level_percent: u8, now: SystemTime) -> Result<()> {
        let mut series = self.series.lock().expect("history lock poisoned");
        let points = series.entry(device_id.to_owned()).or_default();

        let cutoff = now - RETENTION;
        points.retain(|point| point.timestamp > cutoff);

        let accept = match points.last() {
            None => true,
            Some(last) => {
                last.level_percent != level_percent
                    || now.duration_since(last.timestamp).unwrap_or(Duration::ZERO)
                        >= MIN_SAMPLE_GAP
            }
        };

        if !accept {
            return Ok(());
        }

        points.push(HistoryPoint { timestamp: now, level_percent });
        debug!(device_id, level_percent, "history sample recorded");
        self.save(&series)
    }

    /// The retained series for one device, oldest first.
    pub fn history_for(&self, device_id: &str) -> Vec<HistoryPoint> {
        self.series
            .lock()
            .expect("history lock poisoned")
            .get(device_id)
            .cloned()
            .unwrap_or_default()
    }

    fn save(&self, series: &HashMap<String, Vec<HistoryPoint>>) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)
                .map_err(|e| MonitorError::history_error(&self.path, e))?;
        }
        let bytes = serde_json::to_vec(series)
            .map_err(|e| MonitorError::history_error(&self.path, std::io::Error::other(e)))?;
        fs::write(&self.path, bytes).map_err(|e| MonitorError::history_error(&self.path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (tempfile::TempDir, HistoryStore) {
        let dir = tempfile::tempdir().expect("temp dir");
        let store = HistoryStore::open(dir.path().join("history.json"));
        (dir, store)
    }

    #[test]
    fn first_sample_is_always_accepted() {
        let (_dir, store) = store();
        store.record("device-a", 80).unwrap();
        assert_eq!(store.history_for("device-a").len(), 1);
    }

    #[test]
    fn unchanged_level_within_gap_is_rejected() {
        let (_dir, store) = store();
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        store.record_at("device-a", 80, start).unwrap();
        store.record_at("device-a", 80, start + Duration::from_secs(120)).unwrap();

        assert_eq!(store.history_for("device-a").len(), 1);
    }

    #[test]
    fn level_change_is_accepted_immediately() {
        let (_dir, store) = store();
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        store.record_at("device-a", 80, start).unwrap();
        store.record_at("device-a", 79, start + Duration::from_secs(5)).unwrap();

        let points = store.history_for("device-a");
        assert_eq!(points.len(), 2);
        assert_eq!(points[1].level_percent, 79);
    }

    #[test]
    fn unchanged_level_is_accepted_after_the_gap() {
        let (_dir, store) = store();
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        store.record_at("device-a", 80, start).unwrap();
        store.record_at("device-a", 80, start + MIN_SAMPLE_GAP).unwrap();

        assert_eq!(store.history_for("device-a").len(), 2);
    }

    #[test]
    fn samples_older_than_retention_are_pruned() {
        let (_dir, store) = store();
        let start = SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000);

        store.record_at("device-a", 80, start).unwrap();
        store.record_at("device-a", 60, start + RETENTION + Duration::from_secs(60)).unwrap();

        let points = store.history_for("device-a");
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].level_percent, 60);
    }

    #[test]
    fn devices_are_tracked_independently() {
        let (_dir, store) = store();
        store.record("device-a", 80).unwrap();
        store.record("device-b", 30).unwrap();

        assert_eq!(store.history_for("device-a").len(), 1);
        assert_eq!(store.history_for("device-b").len(), 1);
        assert!(store.history_for("device-c").is_empty());
    }

    #[test]
    fn series_survive_a_reopen() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("history.json");

        {
            let store = HistoryStore::open(&path);
            store.record("device-a", 55).unwrap();
        }

        let reopened = HistoryStore::open(&path);
        let points = reopened.history_for("device-a");
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].level_percent, 55);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("history.json");
        fs::write(&path, b"not json at all").unwrap();

        let store = HistoryStore::open(&path);
        assert!(store.history_for("device-a").is_empty());

        // And the store recovers on the next write
        store.record("device-a", 42).unwrap();
        assert_eq!(store.history_for("device-a").len(), 1);
    }
}
