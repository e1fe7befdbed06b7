//! Yield enrichment against the freshest window averages
//!
//! The join is eventually consistent by design: enrichment reads whatever
//! window state exists at processing time. There is no attempt to line up
//! observation timestamps with the yield year.

use super::types::{EnrichedYieldRecord, MetricKind, YieldRecord};
use super::windows::RollingWindowTracker;
use chrono::{DateTime, Utc};

/// Joins yield records with rolling weather averages for one station.
#[derive(Debug, Clone)]
pub struct YieldEnricher {
    target_station: Option<String>,
}

impl YieldEnricher {
    /// `target_station` is the configured enrichment station; `None`
    /// defers to the deterministic fallback.
    pub fn new(target_station: Option<String>) -> Self {
        Self { target_station }
    }

    /// Resolve the station to read averages from: the configured station
    /// when it has window data, otherwise the lowest station id among
    /// stations with data.
    pub fn resolve_station<'a>(&'a self, tracker: &'a RollingWindowTracker) -> Option<&'a str> {
        if let Some(station) = self.target_station.as_deref() {
            if tracker.has_station(station) {
                return Some(station);
            }
        }
        tracker.lowest_station()
    }

    /// Join a validated yield record with window averages.
    ///
    /// `avg_temperature` is the mean of the TMAX and TMIN window averages
    /// and is only present when both exist; `avg_precipitation` is absent
    /// when the station has no precipitation data. `event_time` is the
    /// enrichment instant supplied by the caller.
    pub fn enrich(
        &self,
        record: YieldRecord,
        tracker: &RollingWindowTracker,
        event_time: DateTime<Utc>,
    ) -> EnrichedYieldRecord {
        let station = self.resolve_station(tracker);

        let (avg_precipitation, avg_temperature) = match station {
            Some(station) => {
                let prcp = tracker.latest_average(station, &MetricKind::Precipitation);
                let tmax = tracker.latest_average(station, &MetricKind::TempMax);
                let tmin = tracker.latest_average(station, &MetricKind::TempMin);
                let temp = match (tmax, tmin) {
                    (Some(hi), Some(lo)) => Some((hi + lo) / 2.0),
                    _ => None,
                };
                (prcp, temp)
            }
            None => (None, None),
        };

        EnrichedYieldRecord {
            region: record.region,
            commodity: record.commodity,
            year: record.year,
            yield_value: record.yield_value,
            avg_precipitation,
            avg_temperature,
            event_time,
        }
    }
}
