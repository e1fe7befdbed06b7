//! agristream - real-time correlation of weather and agricultural yield
//! streams, with stream-health monitoring and alerting.
//!
//! Two subsystems:
//! - `correlator` - rolling-window aggregation of weather observations,
//!   drought/flood detection, yield enrichment, binary record output
//! - `monitor` - heartbeat tracking per named stream, deduplicated
//!   incident alerting with SQLite persistence and webhook notification
//!
//! `transport` carries the message-passing seam between the two and the
//! outside world; `output_writer` is the local sink for enriched records.

pub mod correlator;
pub mod monitor;
pub mod output_writer;
pub mod transport;
