//! Monitor configuration from environment variables

use chrono::Duration;
use std::collections::HashMap;
use std::env;

#[derive(Debug)]
pub enum ConfigError {
    InvalidValue(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidValue(msg) => write!(f, "Invalid configuration value: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for the health-monitoring service.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// SQLite database path for the incident log.
    pub db_path: String,
    /// Maximum allowed downtime per monitored stream.
    pub stream_thresholds: HashMap<String, Duration>,
    /// How often to run the downtime check.
    pub check_interval_secs: u64,
    /// Heartbeat channel capacity.
    pub heartbeat_buffer: usize,
    /// Alert webhook endpoint; when unset, alerts go to the log.
    pub webhook_url: Option<String>,
}

impl MonitorConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `AGRISTREAM_DB_PATH` (default: agristream.db)
    /// - `STREAM_DOWNTIME_THRESHOLDS` - comma-separated `name=seconds`
    ///   pairs, e.g. `noaa_weather=120,usda_yield=300` (default: empty)
    /// - `MONITOR_CHECK_INTERVAL_SECS` (default: 30)
    /// - `HEARTBEAT_CHANNEL_BUFFER` (default: 1024)
    /// - `ALERT_WEBHOOK_URL` (default: unset)
    pub fn from_env() -> Result<Self, ConfigError> {
        let thresholds_raw = env::var("STREAM_DOWNTIME_THRESHOLDS").unwrap_or_default();

        Ok(Self {
            db_path: env::var("AGRISTREAM_DB_PATH")
                .unwrap_or_else(|_| "agristream.db".to_string()),

            stream_thresholds: parse_thresholds(&thresholds_raw)?,

            check_interval_secs: env::var("MONITOR_CHECK_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(30),

            heartbeat_buffer: env::var("HEARTBEAT_CHANNEL_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1_024),

            webhook_url: env::var("ALERT_WEBHOOK_URL").ok().filter(|s| !s.is_empty()),
        })
    }
}

/// Parse `name=seconds` pairs separated by commas. An empty input yields
/// an empty map (nothing monitored).
pub fn parse_thresholds(raw: &str) -> Result<HashMap<String, Duration>, ConfigError> {
    let mut thresholds = HashMap::new();

    for pair in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, secs) = pair.split_once('=').ok_or_else(|| {
            ConfigError::InvalidValue(format!("expected name=seconds, got '{}'", pair))
        })?;
        let name = name.trim();
        if name.is_empty() {
            return Err(ConfigError::InvalidValue(format!(
                "empty stream name in '{}'",
                pair
            )));
        }
        let secs: i64 = secs.trim().parse().map_err(|_| {
            ConfigError::InvalidValue(format!("non-numeric threshold in '{}'", pair))
        })?;
        if secs <= 0 {
            return Err(ConfigError::InvalidValue(format!(
                "threshold must be positive in '{}'",
                pair
            )));
        }
        thresholds.insert(name.to_string(), Duration::seconds(secs));
    }

    Ok(thresholds)
}
