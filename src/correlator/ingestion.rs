//! Stream correlation loop - async intake and dispatch
//!
//! One task owns the engine and repeatedly polls the input subscriber
//! with a bounded timeout. Weather messages feed the rolling windows and
//! the anomaly detector; yield messages are enriched, encoded and
//! published to the output topic. A heartbeat is emitted per received
//! message so the monitor can track feed liveness.
//!
//! Failure policy: malformed payloads and rejected records are logged
//! and skipped; non-fatal transport errors are logged and the loop keeps
//! polling; a fatal transport error or the shutdown flag ends the loop,
//! which flushes the publisher before returning.

use super::codec;
use super::config::CorrelatorConfig;
use super::detect::PrecipEvent;
use super::engine::CorrelationEngine;
use crate::monitor::Heartbeat;
use crate::transport::{Publisher, StreamMessage, Subscriber};
use chrono::Utc;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, timeout, Duration};

/// Run the correlation loop until shutdown or a fatal transport error.
///
/// Messages are processed strictly one at a time; in-flight processing
/// always completes before teardown.
pub async fn run_correlation_loop<S, P>(
    mut subscriber: S,
    publisher: P,
    mut engine: CorrelationEngine,
    config: CorrelatorConfig,
    heartbeat_tx: mpsc::Sender<Heartbeat>,
    mut shutdown: watch::Receiver<bool>,
) where
    S: Subscriber<StreamMessage>,
    P: Publisher<StreamMessage>,
{
    log::info!("🚀 Starting stream correlation loop");
    log::info!("   ├─ Weather topic: {}", config.weather_topic);
    log::info!("   ├─ Yield topic: {}", config.yield_topic);
    log::info!("   └─ Output topic: {}", config.output_topic);

    let poll_timeout = Duration::from_millis(config.poll_timeout_ms);
    let mut flush_timer = interval(Duration::from_millis(config.flush_interval_ms));
    let mut received = 0u64;
    let mut published = 0u64;
    let mut skipped = 0u64;

    loop {
        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    log::info!("⚠️  Shutdown signal received, draining correlation loop");
                    break;
                }
            }

            _ = flush_timer.tick() => {
                if let Err(e) = publisher.flush().await {
                    log::error!("❌ Output flush failed: {}", e);
                } else {
                    log::debug!(
                        "Flush tick: {} received, {} published, {} skipped",
                        received, published, skipped
                    );
                }
            }

            polled = timeout(poll_timeout, subscriber.next()) => {
                let msg = match polled {
                    // Empty poll: nothing arrived within the timeout.
                    Err(_) => continue,
                    Ok(Err(e)) if e.is_fatal() => {
                        log::error!("❌ Fatal transport error, stopping loop: {}", e);
                        break;
                    }
                    Ok(Err(e)) => {
                        log::error!("Transport error (continuing): {}", e);
                        continue;
                    }
                    Ok(Ok(msg)) => msg,
                };

                received += 1;
                if msg.topic == config.weather_topic || msg.topic == config.yield_topic {
                    // Receipt alone proves the feed is alive; validity is
                    // judged separately below.
                    let beat = Heartbeat::new(&msg.topic, Utc::now());
                    if heartbeat_tx.try_send(beat).is_err() {
                        log::debug!("Heartbeat channel full or closed, beat dropped");
                    }
                }

                let payload: Value = match serde_json::from_slice(&msg.payload) {
                    Ok(v) => v,
                    Err(e) => {
                        skipped += 1;
                        log::warn!("Undecodable payload on '{}' skipped: {}", msg.topic, e);
                        continue;
                    }
                };

                if msg.topic == config.weather_topic {
                    match engine.handle_weather(&payload) {
                        Ok(Some(PrecipEvent::Drought { station, average })) => {
                            log::warn!("Drought detected at {}: avg_precip={:.2}", station, average);
                        }
                        Ok(Some(PrecipEvent::Flood { station, average })) => {
                            log::warn!("Flood detected at {}: avg_precip={:.2}", station, average);
                        }
                        Ok(None) => {}
                        Err(reason) => {
                            skipped += 1;
                            log::warn!("Invalid weather message skipped: {}", reason);
                        }
                    }
                } else if msg.topic == config.yield_topic {
                    match engine.handle_yield(&payload) {
                        Ok(enriched) => {
                            let encoded = codec::encode(&enriched);
                            let out = StreamMessage::new(config.output_topic.clone(), encoded);
                            match publisher.publish(out).await {
                                Ok(()) => {
                                    published += 1;
                                    log::info!(
                                        "Enriched yield record produced for {} {}",
                                        enriched.region, enriched.year
                                    );
                                }
                                Err(e) => {
                                    log::error!("Failed to publish enriched record: {}", e);
                                }
                            }
                        }
                        Err(reason) => {
                            skipped += 1;
                            log::warn!("Invalid yield message skipped: {}", reason);
                        }
                    }
                } else {
                    skipped += 1;
                    log::debug!("Message on unknown topic '{}' ignored", msg.topic);
                }
            }
        }
    }

    // Drain path: whatever the exit reason, flush buffered output before
    // releasing the transport.
    if let Err(e) = publisher.flush().await {
        log::error!("❌ Final flush failed: {}", e);
    }
    log::info!(
        "✅ Correlation loop stopped: {} received, {} published, {} skipped",
        received,
        published,
        skipped
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::channel_pair;
    use serde_json::json;

    fn test_config() -> CorrelatorConfig {
        CorrelatorConfig {
            broker_addr: "localhost:9092".to_string(),
            consumer_group: "test".to_string(),
            weather_topic: "noaa_weather".to_string(),
            yield_topic: "usda_yield".to_string(),
            output_topic: "enriched_yield".to_string(),
            target_station: None,
            window_days: 7,
            drought_threshold: 1.0,
            flood_threshold: 20.0,
            poll_timeout_ms: 20,
            channel_buffer: 100,
            flush_interval_ms: 10_000,
            output_path: "unused".to_string(),
        }
    }

    fn spawn_loop(
        config: CorrelatorConfig,
    ) -> (
        crate::transport::ChannelPublisher<StreamMessage>,
        crate::transport::ChannelSubscriber<StreamMessage>,
        mpsc::Receiver<Heartbeat>,
        watch::Sender<bool>,
        tokio::task::JoinHandle<()>,
    ) {
        let (in_tx, in_rx) = channel_pair::<StreamMessage>(100);
        let (out_tx, out_rx) = channel_pair::<StreamMessage>(100);
        let (beat_tx, beat_rx) = mpsc::channel(100);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let engine = CorrelationEngine::new(&config);

        let handle = tokio::spawn(run_correlation_loop(
            in_rx, out_tx, engine, config, beat_tx, shutdown_rx,
        ));
        (in_tx, out_rx, beat_rx, shutdown_tx, handle)
    }

    #[tokio::test]
    async fn test_yield_message_produces_encoded_output() {
        let (input, mut output, _beats, shutdown, handle) = spawn_loop(test_config());

        let weather = json!({
            "station": "S1", "date": "2021-05-01", "datatype": "PRCP", "value": 0.8
        });
        input
            .publish(StreamMessage::new(
                "noaa_weather",
                serde_json::to_vec(&weather).unwrap(),
            ))
            .await
            .unwrap();

        let yield_msg = json!({
            "state_name": "MISSOURI", "commodity_desc": "CORN",
            "year": 2021, "Value": 180.0
        });
        input
            .publish(StreamMessage::new(
                "usda_yield",
                serde_json::to_vec(&yield_msg).unwrap(),
            ))
            .await
            .unwrap();

        let out = output.next().await.unwrap();
        assert_eq!(out.topic, "enriched_yield");
        let decoded = codec::decode(&out.payload).unwrap();
        assert_eq!(decoded.region, "MISSOURI");
        assert_eq!(decoded.avg_precipitation, Some(0.8));

        shutdown.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_messages_are_skipped_not_fatal() {
        let (input, mut output, _beats, shutdown, handle) = spawn_loop(test_config());

        // Undecodable payload, then a malformed yield, then a good yield:
        // the loop must survive the first two and process the third.
        input
            .publish(StreamMessage::new("usda_yield", b"not json".to_vec()))
            .await
            .unwrap();
        input
            .publish(StreamMessage::new(
                "usda_yield",
                serde_json::to_vec(&json!({"year": 2021})).unwrap(),
            ))
            .await
            .unwrap();
        input
            .publish(StreamMessage::new(
                "usda_yield",
                serde_json::to_vec(&json!({
                    "state": "IOWA", "commodity": "CORN", "year": 2021, "yield": 55.0
                }))
                .unwrap(),
            ))
            .await
            .unwrap();

        let out = output.next().await.unwrap();
        let decoded = codec::decode(&out.payload).unwrap();
        assert_eq!(decoded.region, "IOWA");

        shutdown.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_heartbeats_emitted_per_received_message() {
        let (input, _output, mut beats, shutdown, handle) = spawn_loop(test_config());

        input
            .publish(StreamMessage::new("noaa_weather", b"not json".to_vec()))
            .await
            .unwrap();

        // Even an undecodable message proves the feed is alive.
        let beat = beats.recv().await.unwrap();
        assert_eq!(beat.stream, "noaa_weather");

        shutdown.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_input_terminates_loop() {
        let (input, _output, _beats, _shutdown, handle) = spawn_loop(test_config());

        drop(input);
        // Fatal transport error: the loop must exit on its own.
        handle.await.unwrap();
    }
}
