//! Runtime - wires the correlation loop and the health monitor together
//!
//! Spawns:
//! - the stream correlation loop (weather/yield intake -> enrichment)
//! - the output sink (framed binary records on disk)
//! - the health monitor (heartbeats -> downtime alerts)
//! - a stdin ingest adapter standing in for external ingestors: one JSON
//!   object per line, shaped `{"topic": "...", "payload": {...}}`
//!
//! Usage:
//!   cargo run --release --bin runtime
//!
//! All configuration comes from environment variables (see
//! `correlator::config` and `monitor::config`); a `.env` file is
//! honored. CTRL+C drains and flushes everything before exit.

use agristream::correlator::{run_correlation_loop, CorrelationEngine, CorrelatorConfig};
use agristream::monitor::{
    run_monitor_service, AlertManager, AlertNotifier, AlertState, Heartbeat, HeartbeatRegistry,
    LogNotifier, MonitorConfig, SqliteIncidentStore, WebhookNotifier,
};
use agristream::output_writer::RecordFileWriter;
use agristream::transport::{channel_pair, Publisher, StreamMessage, Subscriber};
use dotenv::dotenv;
use log::{error, info, warn};
use std::sync::Arc;
use tokio::io::AsyncBufReadExt;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, Duration};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    dotenv().ok();
    env_logger::init();

    info!("🚀 agristream runtime");

    let correlator_config = CorrelatorConfig::from_env()?;
    let monitor_config = MonitorConfig::from_env()?;

    info!("✅ Configuration loaded");
    info!("   ├─ Broker: {} (group: {})", correlator_config.broker_addr, correlator_config.consumer_group);
    info!("   ├─ Topics: {} / {} -> {}",
        correlator_config.weather_topic,
        correlator_config.yield_topic,
        correlator_config.output_topic);
    info!("   ├─ Window: {} days (drought <= {}, flood >= {})",
        correlator_config.window_days,
        correlator_config.drought_threshold,
        correlator_config.flood_threshold);
    info!("   ├─ Incident store: {}", monitor_config.db_path);
    info!("   └─ Monitored streams: {}", monitor_config.stream_thresholds.len());

    if monitor_config.stream_thresholds.is_empty() {
        warn!("⚠️  STREAM_DOWNTIME_THRESHOLDS is empty; the monitor has nothing to watch");
    }

    // Connections and channels are acquired once here and released on the
    // single shutdown path below.
    let store = Arc::new(SqliteIncidentStore::open(&monitor_config.db_path)?);

    let notifier: Arc<dyn AlertNotifier> = match &monitor_config.webhook_url {
        Some(url) => {
            info!("✅ Alert delivery: webhook");
            Arc::new(WebhookNotifier::new(url.clone()))
        }
        None => {
            info!("✅ Alert delivery: log (no ALERT_WEBHOOK_URL configured)");
            Arc::new(LogNotifier)
        }
    };

    let (input_tx, input_rx) = channel_pair::<StreamMessage>(correlator_config.channel_buffer);
    let (output_tx, mut output_rx) = channel_pair::<StreamMessage>(correlator_config.channel_buffer);
    let (heartbeat_tx, heartbeat_rx) = mpsc::channel::<Heartbeat>(monitor_config.heartbeat_buffer);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // Output sink: framed binary records on disk. Opened before spawning
    // so a bad path aborts startup instead of failing silently later.
    let mut record_writer = RecordFileWriter::new(&correlator_config.output_path)?;
    info!("✅ Output sink: {}", correlator_config.output_path);

    let sink_flush_ms = correlator_config.flush_interval_ms;
    let sink_handle = tokio::spawn(async move {
        let mut flush_timer = interval(Duration::from_millis(sink_flush_ms));
        loop {
            tokio::select! {
                msg = output_rx.next() => {
                    match msg {
                        Ok(msg) => {
                            if let Err(e) = record_writer.append(&msg.payload) {
                                error!("❌ Failed to write output record: {}", e);
                            }
                        }
                        // Publisher gone: the correlation loop has ended.
                        Err(_) => break,
                    }
                }
                _ = flush_timer.tick() => {
                    if let Err(e) = record_writer.flush() {
                        error!("❌ Failed to flush output sink: {}", e);
                    }
                }
            }
        }
        if let Err(e) = record_writer.flush() {
            error!("❌ Final sink flush failed: {}", e);
        }
        info!("✅ Output sink stopped ({} records)", record_writer.records_written());
    });

    // Correlation loop.
    let engine = CorrelationEngine::new(&correlator_config);
    let correlation_handle = tokio::spawn(run_correlation_loop(
        input_rx,
        output_tx,
        engine,
        correlator_config.clone(),
        heartbeat_tx.clone(),
        shutdown_rx.clone(),
    ));

    // Health monitor.
    let manager = AlertManager::new(
        monitor_config.stream_thresholds.clone(),
        HeartbeatRegistry::new(),
        AlertState::new(),
        store,
        notifier,
    );
    let monitor_handle = tokio::spawn(run_monitor_service(
        manager,
        heartbeat_rx,
        monitor_config.check_interval_secs,
        shutdown_rx.clone(),
    ));

    // Stdin ingest adapter. External ingestors would publish into the
    // input channel the same way; this keeps a single-process deployment
    // operable end to end.
    let feeder_publisher = input_tx.clone();
    let mut feeder_shutdown = shutdown_rx.clone();
    let feeder_handle = tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                changed = feeder_shutdown.changed() => {
                    if changed.is_err() || *feeder_shutdown.borrow() {
                        break;
                    }
                }
                line = lines.next_line() => {
                    let line = match line {
                        Ok(Some(line)) => line,
                        Ok(None) => {
                            info!("Stdin closed, ingest adapter stopping");
                            break;
                        }
                        Err(e) => {
                            error!("Stdin read error: {}", e);
                            break;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<serde_json::Value>(&line) {
                        Ok(envelope) => {
                            let topic = envelope.get("topic").and_then(|t| t.as_str());
                            let payload = envelope.get("payload");
                            match (topic, payload) {
                                (Some(topic), Some(payload)) => {
                                    let msg = StreamMessage::new(
                                        topic,
                                        payload.to_string().into_bytes(),
                                    );
                                    if feeder_publisher.publish(msg).await.is_err() {
                                        break;
                                    }
                                }
                                _ => warn!("Ingest line missing topic/payload, skipped"),
                            }
                        }
                        Err(e) => warn!("Undecodable ingest line skipped: {}", e),
                    }
                }
            }
        }
    });

    info!("✅ All tasks running");
    info!("🔄 Press CTRL+C to shutdown gracefully");

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("⚠️  Received CTRL+C, shutting down..."),
        Err(e) => error!("❌ Failed to listen for CTRL+C: {}", e),
    }

    // Single shutdown path: flip the flag, drop our input handle so the
    // channel can close, and give the loops a bounded drain window.
    let _ = shutdown_tx.send(true);
    drop(input_tx);
    drop(heartbeat_tx);

    for (name, handle) in [
        ("ingest adapter", feeder_handle),
        ("correlation loop", correlation_handle),
        ("output sink", sink_handle),
        ("monitor", monitor_handle),
    ] {
        match tokio::time::timeout(Duration::from_secs(5), handle).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("❌ {} task panicked: {}", name, e),
            Err(_) => warn!("⚠️  {} did not stop within 5s", name),
        }
    }

    info!("✅ Runtime stopped");
    Ok(())
}
