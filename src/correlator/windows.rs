//! Rolling time-window state per (station, metric)
//!
//! Each key owns an arrival-ordered buffer of `(timestamp, value)` pairs
//! bounded to `window` of the most recently inserted entry's timestamp.
//! Eviction pops from the front only: an out-of-order arrival older than
//! the window front is appended at the back and simply ages out on later
//! inserts. That looseness is accepted - windows are advisory trailing
//! state, not an ordered log.

use super::types::MetricKind;
use chrono::{DateTime, Duration, Utc};
use std::collections::{HashMap, VecDeque};

/// Per-(station, metric) rolling windows with trailing averages.
#[derive(Debug)]
pub struct RollingWindowTracker {
    window: Duration,
    series: HashMap<(String, MetricKind), VecDeque<(DateTime<Utc>, f64)>>,
}

impl RollingWindowTracker {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            series: HashMap::new(),
        }
    }

    /// Append an observation to its window, then evict entries older than
    /// `timestamp - window` from the front.
    ///
    /// The cutoff is relative to the inserted entry's timestamp, not
    /// wall-clock time, so replayed history windows correctly.
    pub fn insert(
        &mut self,
        station: &str,
        metric: MetricKind,
        timestamp: DateTime<Utc>,
        value: f64,
    ) {
        let buf = self
            .series
            .entry((station.to_string(), metric))
            .or_default();
        buf.push_back((timestamp, value));

        let cutoff = timestamp - self.window;
        while let Some((front_ts, _)) = buf.front() {
            if *front_ts < cutoff {
                buf.pop_front();
            } else {
                break;
            }
        }
    }

    /// Arithmetic mean of the current window, or 0.0 when empty.
    pub fn average(&self, station: &str, metric: &MetricKind) -> f64 {
        self.latest_average(station, metric).unwrap_or(0.0)
    }

    /// Arithmetic mean of the current window, or `None` when the window
    /// is absent or empty. Enrichment uses this so "no data" maps to
    /// null rather than 0.0.
    pub fn latest_average(&self, station: &str, metric: &MetricKind) -> Option<f64> {
        let buf = self
            .series
            .get(&(station.to_string(), metric.clone()))
            .filter(|buf| !buf.is_empty())?;
        let sum: f64 = buf.iter().map(|(_, v)| v).sum();
        Some(sum / buf.len() as f64)
    }

    /// Whether any window exists for this station.
    pub fn has_station(&self, station: &str) -> bool {
        self.series.keys().any(|(s, _)| s == station)
    }

    /// Lowest station id among stations with window data - the
    /// deterministic fallback when no target station is configured.
    pub fn lowest_station(&self) -> Option<&str> {
        self.series
            .iter()
            .filter(|(_, buf)| !buf.is_empty())
            .map(|((station, _), _)| station.as_str())
            .min()
    }

    /// Number of entries currently held for a key.
    pub fn len(&self, station: &str, metric: &MetricKind) -> usize {
        self.series
            .get(&(station.to_string(), metric.clone()))
            .map(|buf| buf.len())
            .unwrap_or(0)
    }
}
