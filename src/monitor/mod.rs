//! Stream health monitoring and alerting
//!
//! Tracks per-stream heartbeats, raises a deduplicated incident alert
//! when a stream goes silent past its threshold, persists incidents to
//! SQLite, and delivers best-effort notifications.
//!
//! Module organization:
//! - `registry` - heartbeat last-seen map and open-alert state
//! - `store` - incident persistence (trait + SQLite)
//! - `notify` - alert delivery (trait + webhook/log)
//! - `manager` - alerting policy and orchestration
//! - `service` - the single-task check loop
//! - `config` - environment configuration

pub mod config;
pub mod manager;
pub mod notify;
pub mod registry;
pub mod service;
pub mod store;

pub use config::MonitorConfig;
pub use manager::AlertManager;
pub use notify::{AlertMessage, AlertNotifier, LogNotifier, NotifyError, WebhookNotifier};
pub use registry::{AlertState, Heartbeat, HeartbeatRegistry};
pub use service::run_monitor_service;
pub use store::{Incident, IncidentStore, SqliteIncidentStore};
