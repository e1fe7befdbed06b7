//! Correlator configuration from environment variables

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

/// Configuration for the stream correlation loop.
///
/// Broker address and consumer group are carried for the broker-facing
/// collaborator; the core itself only dispatches on the topic names.
#[derive(Debug, Clone)]
pub struct CorrelatorConfig {
    pub broker_addr: String,
    pub consumer_group: String,
    pub weather_topic: String,
    pub yield_topic: String,
    pub output_topic: String,
    /// Station used for enrichment; `None` falls back to the lowest
    /// station id with data.
    pub target_station: Option<String>,
    /// Rolling window size in days.
    pub window_days: i64,
    pub drought_threshold: f64,
    pub flood_threshold: f64,
    /// Bounded poll timeout for the input subscriber.
    pub poll_timeout_ms: u64,
    /// Input channel capacity (messages).
    pub channel_buffer: usize,
    /// Outbound publisher flush interval.
    pub flush_interval_ms: u64,
    /// Local sink for encoded enriched records.
    pub output_path: String,
}

impl CorrelatorConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `BROKER_ADDR` (default: localhost:9092)
    /// - `CONSUMER_GROUP` (default: agri_processor)
    /// - `WEATHER_TOPIC` (default: noaa_weather)
    /// - `YIELD_TOPIC` (default: usda_yield)
    /// - `OUTPUT_TOPIC` (default: enriched_yield)
    /// - `TARGET_STATION_ID` (default: unset)
    /// - `ROLLING_WINDOW_DAYS` (default: 7)
    /// - `DROUGHT_THRESHOLD` (default: 1.0)
    /// - `FLOOD_THRESHOLD` (default: 20.0)
    /// - `POLL_TIMEOUT_MS` (default: 1000)
    /// - `INPUT_CHANNEL_BUFFER` (default: 10000)
    /// - `OUTPUT_FLUSH_INTERVAL_MS` (default: 5000)
    /// - `OUTPUT_PATH` (default: streams/enriched/records.dat)
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            broker_addr: env::var("BROKER_ADDR").unwrap_or_else(|_| "localhost:9092".to_string()),

            consumer_group: env::var("CONSUMER_GROUP")
                .unwrap_or_else(|_| "agri_processor".to_string()),

            weather_topic: env::var("WEATHER_TOPIC")
                .unwrap_or_else(|_| "noaa_weather".to_string()),

            yield_topic: env::var("YIELD_TOPIC").unwrap_or_else(|_| "usda_yield".to_string()),

            output_topic: env::var("OUTPUT_TOPIC")
                .unwrap_or_else(|_| "enriched_yield".to_string()),

            target_station: env::var("TARGET_STATION_ID")
                .ok()
                .filter(|s| !s.is_empty()),

            window_days: env::var("ROLLING_WINDOW_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(7),

            drought_threshold: env::var("DROUGHT_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1.0),

            flood_threshold: env::var("FLOOD_THRESHOLD")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(20.0),

            poll_timeout_ms: env::var("POLL_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(1_000),

            channel_buffer: env::var("INPUT_CHANNEL_BUFFER")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(10_000),

            flush_interval_ms: env::var("OUTPUT_FLUSH_INTERVAL_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5_000),

            output_path: env::var("OUTPUT_PATH")
                .unwrap_or_else(|_| "streams/enriched/records.dat".to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.window_days < 1 {
            return Err(ConfigError::InvalidValue(format!(
                "ROLLING_WINDOW_DAYS must be >= 1, got {}",
                self.window_days
            )));
        }
        if self.poll_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "POLL_TIMEOUT_MS must be > 0".to_string(),
            ));
        }
        if self.drought_threshold >= self.flood_threshold {
            log::warn!(
                "DROUGHT_THRESHOLD {} >= FLOOD_THRESHOLD {}; drought takes precedence where both match",
                self.drought_threshold,
                self.flood_threshold
            );
        }
        Ok(())
    }
}
