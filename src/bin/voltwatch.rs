//! Terminal battery monitor: prints host battery state and streams the
//! tethered-device list, recording level history along the way.

use std::path::PathBuf;

use anyhow::Context;
use futures::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use voltwatch::host::DEFAULT_POLL_INTERVAL;
use voltwatch::{HostBatteryStats, Voltwatch};

fn history_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => {
            PathBuf::from(home).join("Library/Application Support/voltwatch/history.json")
        }
        None => std::env::temp_dir().join("voltwatch-history.json"),
    }
}

fn print_host(stats: &HostBatteryStats) {
    println!(
        "host: {}/{} mAh  health {:.1}% (cycles {})  {:.2} W  {:.1} C  {}",
        stats.current_capacity_mah,
        stats.max_capacity_mah,
        stats.health_percent(),
        stats.cycle_count,
        stats.watts(),
        stats.temperature_c,
        if stats.is_charging { "charging" } else { "discharging" },
    );
    match stats.time_remaining_minutes {
        Some(minutes) => println!("      {}h{:02}m remaining", minutes / 60, minutes % 60),
        None => println!("      time remaining unknown"),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let history = Voltwatch::history(history_path());

    let host = Voltwatch::host().context("host battery reader unavailable")?;
    let stats = host.stats().context("host battery query failed")?;
    print_host(&stats);

    // Device monitoring degrades gracefully: without the native library the
    // list stays empty and only the host battery is shown.
    let monitor = match Voltwatch::monitor() {
        Ok(monitor) => monitor,
        Err(error) => {
            warn!(%error, "handheld device monitoring unavailable");
            let mut host_poll = Box::pin(host.poll(DEFAULT_POLL_INTERVAL));
            while let Some(stats) = host_poll.next().await {
                print_host(&stats);
            }
            return Ok(());
        }
    };

    info!("watching for tethered devices");
    let mut snapshots = Box::pin(monitor.snapshots());
    let mut host_poll = Box::pin(host.poll(DEFAULT_POLL_INTERVAL));

    loop {
        tokio::select! {
            Some(devices) = snapshots.next() => {
                if devices.is_empty() {
                    println!("no tethered devices");
                }
                for device in devices.iter() {
                    println!(
                        "{} ({}): {}%  health {:.1}% (cycles {})  {}",
                        device.display_name,
                        device.model_identifier,
                        device.level_percent,
                        device.health_percent(),
                        device.cycle_count,
                        if device.is_charging { "charging" } else { "on battery" },
                    );
                    if let Err(error) = history.record(&device.identifier, device.level_percent) {
                        warn!(%error, "history sample not recorded");
                    }
                }
            }
            Some(stats) = host_poll.next() => {
                print_host(&stats);
            }
            else => break,
        }
    }

    Ok(())
}
