//! Precipitation anomaly classification
//!
//! A window average at or below the drought threshold is a drought; at or
//! above the flood threshold, a flood. Drought is checked first: with a
//! sane configuration (drought < flood) the two cannot overlap, but the
//! precedence is a deliberate tie-break for degenerate configurations,
//! not an accident of ordering.

/// A detected precipitation anomaly for one station.
#[derive(Debug, Clone, PartialEq)]
pub enum PrecipEvent {
    Drought { station: String, average: f64 },
    Flood { station: String, average: f64 },
}

impl PrecipEvent {
    pub fn station(&self) -> &str {
        match self {
            PrecipEvent::Drought { station, .. } | PrecipEvent::Flood { station, .. } => station,
        }
    }
}

/// Threshold classifier for precipitation window averages.
#[derive(Debug, Clone)]
pub struct EventDetector {
    drought_threshold: f64,
    flood_threshold: f64,
}

impl EventDetector {
    pub fn new(drought_threshold: f64, flood_threshold: f64) -> Self {
        Self {
            drought_threshold,
            flood_threshold,
        }
    }

    /// Classify a precipitation window average for a station.
    pub fn classify(&self, station: &str, average: f64) -> Option<PrecipEvent> {
        if average <= self.drought_threshold {
            Some(PrecipEvent::Drought {
                station: station.to_string(),
                average,
            })
        } else if average >= self.flood_threshold {
            Some(PrecipEvent::Flood {
                station: station.to_string(),
                average,
            })
        } else {
            None
        }
    }
}
