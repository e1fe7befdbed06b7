//! Monitor service loop
//!
//! One task owns the alert manager and multiplexes heartbeat intake with
//! the periodic downtime check. Running both from a single task is what
//! guarantees `check_streams` invocations never overlap.

use super::manager::AlertManager;
use super::registry::Heartbeat;
use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration};

/// Run the monitor until shutdown.
///
/// Heartbeats may keep arriving after the heartbeat channel's senders
/// are gone; the check timer keeps running either way so silent streams
/// still alert.
pub async fn run_monitor_service(
    mut manager: AlertManager,
    mut heartbeat_rx: mpsc::Receiver<Heartbeat>,
    check_interval_secs: u64,
    mut shutdown: watch::Receiver<bool>,
) {
    log::info!("🚀 Starting stream health monitor");
    log::info!("   └─ Check interval: {}s", check_interval_secs);

    let mut check_timer = interval(Duration::from_secs(check_interval_secs));
    // The first tick fires immediately; skip it so freshly started
    // streams get one full interval before their first check.
    check_timer.tick().await;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    log::info!("⚠️  Shutdown signal received, stopping monitor");
                    break;
                }
            }

            Some(beat) = heartbeat_rx.recv() => {
                manager.record_heartbeat(&beat.stream, beat.at).await;
            }

            _ = check_timer.tick() => {
                manager.check_streams(Utc::now()).await;
                log::debug!("Downtime check complete: {} open alert(s)", manager.open_alert_count());
            }
        }
    }

    log::info!(
        "✅ Monitor stopped with {} open alert(s)",
        manager.open_alert_count()
    );
}
