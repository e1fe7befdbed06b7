//! Alert manager - heartbeat intake, downtime checks, deduplication
//!
//! Orchestrates the heartbeat registry, the open-alert set, the incident
//! store and the notifier. Owns all alerting policy:
//!
//! - a stream is alerted when its heartbeat is absent or stale for at
//!   least its configured threshold, and only if it has no open alert
//!   (at most one open incident per stream, ever);
//! - a heartbeat on an alerted stream acknowledges the incident
//!   (recovery path, identical clearing to a manual ack);
//! - a stream is marked alerted even when persistence or notification
//!   fails - better to under-notify than to duplicate-alert.
//!
//! Callers must not overlap invocations; the service loop runs the
//! manager from a single task, which is what preserves the
//! one-open-incident invariant.

use super::notify::{AlertMessage, AlertNotifier};
use super::registry::{AlertState, HeartbeatRegistry};
use super::store::IncidentStore;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

pub struct AlertManager {
    /// Maximum allowed downtime per monitored stream.
    thresholds: HashMap<String, Duration>,
    registry: HeartbeatRegistry,
    alert_state: AlertState,
    store: Arc<dyn IncidentStore>,
    notifier: Arc<dyn AlertNotifier>,
}

impl AlertManager {
    pub fn new(
        thresholds: HashMap<String, Duration>,
        registry: HeartbeatRegistry,
        alert_state: AlertState,
        store: Arc<dyn IncidentStore>,
        notifier: Arc<dyn AlertNotifier>,
    ) -> Self {
        Self {
            thresholds,
            registry,
            alert_state,
            store,
            notifier,
        }
    }

    /// Record a heartbeat for a stream. If the stream is currently
    /// alerted this is the recovery path: the open incident is
    /// acknowledged exactly as a manual ack would.
    pub async fn record_heartbeat(&mut self, stream: &str, at: DateTime<Utc>) {
        self.registry.record(stream, at);
        if self.alert_state.is_open(stream) {
            log::info!("Stream '{}' recovered at {}", stream, at.to_rfc3339());
            self.ack(stream, at).await;
        }
    }

    /// Check every configured stream for downtime and raise alerts as
    /// needed. A stream with an open alert is never re-alerted.
    pub async fn check_streams(&mut self, now: DateTime<Utc>) {
        let breaches: Vec<(String, String)> = self
            .thresholds
            .iter()
            .filter_map(|(stream, threshold)| {
                if self.alert_state.is_open(stream) {
                    return None;
                }
                match self.registry.last_seen(stream) {
                    None => Some((
                        stream.clone(),
                        format!("No data ever received for '{}'", stream),
                    )),
                    Some(last) if now - last >= *threshold => Some((
                        stream.clone(),
                        format!("No data for '{}' since {}", stream, last.to_rfc3339()),
                    )),
                    Some(_) => None,
                }
            })
            .collect();

        for (stream, details) in breaches {
            self.raise_alert(&stream, "down", &details, now).await;
        }
    }

    /// Acknowledge the open alert for a stream, if any. Clears the open
    /// flag and marks the stream's unacknowledged incidents. A stream
    /// with no open alert is a no-op.
    pub async fn ack(&mut self, stream: &str, at: DateTime<Utc>) {
        if !self.alert_state.clear(stream) {
            return;
        }
        match self.store.acknowledge(stream, at).await {
            Ok(updated) => {
                log::info!("Acknowledged {} incident(s) for stream '{}'", updated, stream);
            }
            Err(e) => {
                log::error!("Failed to acknowledge incidents for {}: {}", stream, e);
            }
        }
    }

    /// Persist a new incident and send the notification.
    ///
    /// Neither failure gates the other, and the stream is marked alerted
    /// regardless, so the deduplication invariant survives partial
    /// failure.
    async fn raise_alert(
        &mut self,
        stream: &str,
        incident_type: &str,
        details: &str,
        now: DateTime<Utc>,
    ) {
        match self.store.append(stream, incident_type, now, details).await {
            Ok(id) => log::info!("Incident #{} recorded for stream '{}'", id, stream),
            Err(e) => log::error!("Failed to persist incident for {}: {}", stream, e),
        }

        let alert = AlertMessage {
            stream_name: stream.to_string(),
            incident_type: incident_type.to_string(),
            detected_at: now,
            details: details.to_string(),
        };
        match self.notifier.send(&alert).await {
            Ok(()) => log::info!(
                "Alert sent via {} for stream '{}'",
                self.notifier.channel_name(),
                stream
            ),
            Err(e) => log::error!("Failed to send alert for {}: {}", stream, e),
        }

        self.alert_state.mark_open(stream);
    }

    pub fn is_alerted(&self, stream: &str) -> bool {
        self.alert_state.is_open(stream)
    }

    pub fn open_alert_count(&self) -> usize {
        self.alert_state.open_count()
    }
}
