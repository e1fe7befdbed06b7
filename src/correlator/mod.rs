//! Stream correlation and enrichment
//!
//! Correlates weather observations with agricultural yield reports:
//! rolling-window aggregation per (station, metric), drought/flood
//! classification of precipitation averages, yield enrichment with the
//! freshest window state, and binary serialization of the result.
//!
//! Module organization:
//! - `types` - message model and validation (tagged rejects)
//! - `windows` - rolling window tracker
//! - `detect` - precipitation anomaly classification
//! - `enrich` - yield enrichment
//! - `codec` - fixed binary schema for enriched records
//! - `engine` - synchronous dispatch core
//! - `ingestion` - the async correlation loop
//! - `config` - environment configuration

pub mod codec;
pub mod config;
pub mod detect;
pub mod engine;
pub mod enrich;
pub mod ingestion;
pub mod types;
pub mod windows;

pub use config::CorrelatorConfig;
pub use detect::{EventDetector, PrecipEvent};
pub use engine::CorrelationEngine;
pub use enrich::YieldEnricher;
pub use ingestion::run_correlation_loop;
pub use types::{EnrichedYieldRecord, MetricKind, Observation, RejectReason, YieldRecord};
pub use windows::RollingWindowTracker;
