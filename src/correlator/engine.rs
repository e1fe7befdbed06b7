//! Correlation engine - synchronous dispatch core
//!
//! Owns the rolling windows, the anomaly detector and the enricher, and
//! applies one message at a time. No I/O happens here; the async loop in
//! `ingestion` feeds it and routes its outputs. Single-writer by
//! construction: the loop task owns the engine exclusively.

use super::config::CorrelatorConfig;
use super::detect::{EventDetector, PrecipEvent};
use super::enrich::YieldEnricher;
use super::types::{
    parse_weather, parse_yield, EnrichedYieldRecord, MetricKind, RejectReason,
};
use super::windows::RollingWindowTracker;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;

/// Per-process correlation state: rolling windows plus the detection and
/// enrichment components configured at startup.
pub struct CorrelationEngine {
    tracker: RollingWindowTracker,
    detector: EventDetector,
    enricher: YieldEnricher,
    /// Timestamp source, injectable for deterministic tests.
    now_fn: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl CorrelationEngine {
    pub fn new(config: &CorrelatorConfig) -> Self {
        Self::with_clock(config, Box::new(Utc::now))
    }

    /// Create an engine with a custom timestamp function (used by tests
    /// to pin `event_time`).
    pub fn with_clock(
        config: &CorrelatorConfig,
        now_fn: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
    ) -> Self {
        Self {
            tracker: RollingWindowTracker::new(Duration::days(config.window_days)),
            detector: EventDetector::new(config.drought_threshold, config.flood_threshold),
            enricher: YieldEnricher::new(config.target_station.clone()),
            now_fn,
        }
    }

    /// Apply a weather message: validate, insert into the window, and for
    /// precipitation classify the new window average.
    ///
    /// A reject leaves every window untouched.
    pub fn handle_weather(&mut self, msg: &Value) -> Result<Option<PrecipEvent>, RejectReason> {
        let obs = parse_weather(msg)?;

        self.tracker
            .insert(&obs.station, obs.metric.clone(), obs.timestamp, obs.value);

        if obs.metric == MetricKind::Precipitation {
            let average = self.tracker.average(&obs.station, &MetricKind::Precipitation);
            return Ok(self.detector.classify(&obs.station, average));
        }
        Ok(None)
    }

    /// Apply a yield message: validate, then join with whatever window
    /// state exists right now (eventually consistent by design).
    pub fn handle_yield(&mut self, msg: &Value) -> Result<EnrichedYieldRecord, RejectReason> {
        let record = parse_yield(msg)?;
        Ok(self
            .enricher
            .enrich(record, &self.tracker, (self.now_fn)()))
    }

    pub fn tracker(&self) -> &RollingWindowTracker {
        &self.tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn test_config() -> CorrelatorConfig {
        CorrelatorConfig {
            broker_addr: "localhost:9092".to_string(),
            consumer_group: "test".to_string(),
            weather_topic: "noaa_weather".to_string(),
            yield_topic: "usda_yield".to_string(),
            output_topic: "enriched_yield".to_string(),
            target_station: Some("S1".to_string()),
            window_days: 3,
            drought_threshold: 1.0,
            flood_threshold: 20.0,
            poll_timeout_ms: 100,
            channel_buffer: 100,
            flush_interval_ms: 1_000,
            output_path: "unused".to_string(),
        }
    }

    fn weather_msg(station: &str, day: u32, datatype: &str, value: f64) -> Value {
        json!({
            "station": station,
            "date": format!("2021-05-{:02}", day),
            "datatype": datatype,
            "value": value
        })
    }

    #[test]
    fn test_three_dry_days_signal_drought() {
        // Scenario: 0.5 precipitation on three consecutive days with a
        // 3-day window and drought threshold 1.0.
        let mut engine = CorrelationEngine::new(&test_config());

        let mut last = None;
        for day in 1..=3 {
            last = engine
                .handle_weather(&weather_msg("S1", day, "PRCP", 0.5))
                .unwrap();
        }

        match last {
            Some(PrecipEvent::Drought { station, average }) => {
                assert_eq!(station, "S1");
                assert_eq!(average, 0.5);
            }
            other => panic!("expected drought, got {:?}", other),
        }
    }

    #[test]
    fn test_temperature_inserts_raise_no_events() {
        let mut engine = CorrelationEngine::new(&test_config());

        let event = engine
            .handle_weather(&weather_msg("S1", 1, "TMAX", 35.0))
            .unwrap();
        assert_eq!(event, None);
        assert_eq!(engine.tracker().len("S1", &MetricKind::TempMax), 1);
    }

    #[test]
    fn test_malformed_weather_mutates_nothing() {
        let mut engine = CorrelationEngine::new(&test_config());
        engine
            .handle_weather(&weather_msg("S1", 1, "PRCP", 0.5))
            .unwrap();

        let bad = json!({"station": "S1", "date": "garbage", "datatype": "PRCP", "value": 1.0});
        assert!(engine.handle_weather(&bad).is_err());
        assert_eq!(engine.tracker().len("S1", &MetricKind::Precipitation), 1);
    }

    #[test]
    fn test_yield_enrichment_uses_current_windows() {
        let event_time = Utc.with_ymd_and_hms(2021, 9, 30, 12, 0, 0).unwrap();
        let mut engine =
            CorrelationEngine::with_clock(&test_config(), Box::new(move || event_time));

        engine
            .handle_weather(&weather_msg("S1", 1, "PRCP", 0.8))
            .unwrap();
        engine
            .handle_weather(&weather_msg("S1", 1, "TMAX", 30.0))
            .unwrap();
        engine
            .handle_weather(&weather_msg("S1", 1, "TMIN", 18.0))
            .unwrap();

        let enriched = engine
            .handle_yield(&json!({
                "state_name": "MISSOURI",
                "commodity_desc": "CORN",
                "year": 2021,
                "Value": 180.0
            }))
            .unwrap();

        assert_eq!(enriched.avg_precipitation, Some(0.8));
        assert_eq!(enriched.avg_temperature, Some(24.0));
        assert_eq!(enriched.event_time, event_time);
    }

    #[test]
    fn test_malformed_yield_is_rejected() {
        let mut engine = CorrelationEngine::new(&test_config());
        let err = engine
            .handle_yield(&json!({"commodity": "CORN", "year": 2021, "Value": 1.0}))
            .unwrap_err();
        assert_eq!(err, RejectReason::MissingField("state_name|state"));
    }
}
