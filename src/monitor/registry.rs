//! Heartbeat tracking and open-alert state
//!
//! Both structs are explicit owned registries constructed once and handed
//! to the alert manager - no ambient/static state, so tests get a fresh
//! registry per case.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};

/// A liveness signal for a named stream.
#[derive(Debug, Clone, PartialEq)]
pub struct Heartbeat {
    pub stream: String,
    pub at: DateTime<Utc>,
}

impl Heartbeat {
    pub fn new(stream: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            stream: stream.into(),
            at,
        }
    }
}

/// Last-seen timestamp per monitored stream. One entry per stream,
/// overwritten on every heartbeat.
#[derive(Debug, Default)]
pub struct HeartbeatRegistry {
    last_seen: HashMap<String, DateTime<Utc>>,
}

impl HeartbeatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, stream: &str, at: DateTime<Utc>) {
        self.last_seen.insert(stream.to_string(), at);
    }

    pub fn last_seen(&self, stream: &str) -> Option<DateTime<Utc>> {
        self.last_seen.get(stream).copied()
    }
}

/// Streams with an open (unacknowledged) incident.
///
/// Invariant: a stream is in this set iff its latest incident is
/// unacknowledged. Membership is what suppresses duplicate alerts while
/// an incident stays open.
#[derive(Debug, Default)]
pub struct AlertState {
    open: HashSet<String>,
}

impl AlertState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_open(&self, stream: &str) -> bool {
        self.open.contains(stream)
    }

    pub fn mark_open(&mut self, stream: &str) {
        self.open.insert(stream.to_string());
    }

    /// Clear a stream's open flag; returns whether it was open.
    pub fn clear(&mut self, stream: &str) -> bool {
        self.open.remove(stream)
    }

    pub fn open_count(&self) -> usize {
        self.open.len()
    }
}
