//! Message model for the correlation engine
//!
//! Inbound weather and yield messages are loosely-keyed JSON from upstream
//! ingestors. Validation happens here, once, and returns a tagged result:
//! either a well-formed record or a `RejectReason` the caller logs and
//! skips. Nothing downstream of this module sees a partial record.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::Value;

/// Kind of weather metric carried by an observation.
///
/// `PRCP`, `TMAX` and `TMIN` get first-class variants because detection
/// and enrichment read them by name; every other datatype is still
/// windowed under `Other` so its average stays queryable.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Precipitation,
    TempMax,
    TempMin,
    Other(String),
}

impl MetricKind {
    /// Map an upstream datatype code (case-insensitive) to a metric kind.
    pub fn from_datatype(datatype: &str) -> Self {
        match datatype.to_ascii_uppercase().as_str() {
            "PRCP" => MetricKind::Precipitation,
            "TMAX" => MetricKind::TempMax,
            "TMIN" => MetricKind::TempMin,
            _ => MetricKind::Other(datatype.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            MetricKind::Precipitation => "PRCP",
            MetricKind::TempMax => "TMAX",
            MetricKind::TempMin => "TMIN",
            MetricKind::Other(name) => name,
        }
    }
}

/// A single validated weather observation.
#[derive(Debug, Clone)]
pub struct Observation {
    pub station: String,
    pub timestamp: DateTime<Utc>,
    pub metric: MetricKind,
    pub value: f64,
}

/// A validated yield report, pre-enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct YieldRecord {
    pub region: String,
    pub commodity: String,
    pub year: i32,
    pub yield_value: f64,
}

/// A yield record joined with the freshest window averages.
///
/// `event_time` is the enrichment instant, not any observation time.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedYieldRecord {
    pub region: String,
    pub commodity: String,
    pub year: i32,
    pub yield_value: f64,
    pub avg_precipitation: Option<f64>,
    pub avg_temperature: Option<f64>,
    pub event_time: DateTime<Utc>,
}

/// Why an inbound message was rejected.
///
/// Rejections are logged and skipped; they never mutate window state and
/// never abort the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    MissingField(&'static str),
    EmptyField(&'static str),
    UnparsableTimestamp(String),
    UnparsableNumber(&'static str),
    NotAnObject,
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RejectReason::MissingField(field) => write!(f, "missing required field '{}'", field),
            RejectReason::EmptyField(field) => write!(f, "empty value for field '{}'", field),
            RejectReason::UnparsableTimestamp(raw) => write!(f, "unparsable timestamp '{}'", raw),
            RejectReason::UnparsableNumber(field) => {
                write!(f, "non-numeric value for field '{}'", field)
            }
            RejectReason::NotAnObject => write!(f, "payload is not a JSON object"),
        }
    }
}

impl std::error::Error for RejectReason {}

/// Parse a weather intake message.
///
/// Expected shape: `{station, date|time, datatype, value}`. The timestamp
/// key precedence is `date` then `time`.
pub fn parse_weather(msg: &Value) -> Result<Observation, RejectReason> {
    let obj = msg.as_object().ok_or(RejectReason::NotAnObject)?;

    let station = require_string(obj, "station")?;
    let date_str = first_present(obj, &["date", "time"])
        .ok_or(RejectReason::MissingField("date|time"))?;
    let date_str = date_str
        .as_str()
        .ok_or(RejectReason::UnparsableTimestamp(date_str.to_string()))?;
    if date_str.is_empty() {
        return Err(RejectReason::EmptyField("date|time"));
    }

    let datatype = require_string(obj, "datatype")?;
    let value = obj
        .get("value")
        .ok_or(RejectReason::MissingField("value"))
        .and_then(|v| as_f64(v, "value"))?;

    Ok(Observation {
        station: station.to_string(),
        timestamp: parse_timestamp(date_str)?,
        metric: MetricKind::from_datatype(datatype),
        value,
    })
}

/// Parse a yield intake message.
///
/// Upstream producers disagree on key spellings; the precedence order is
/// fixed here and matches first *present* key (presence, not truthiness):
/// - region:    `state_name`, then `state`
/// - commodity: `commodity_desc`, then `commodity`
/// - year:      `year`, then `Year`
/// - value:     `Value`, then `yield`, then `value`
pub fn parse_yield(msg: &Value) -> Result<YieldRecord, RejectReason> {
    let obj = msg.as_object().ok_or(RejectReason::NotAnObject)?;

    let region = first_present(obj, &["state_name", "state"])
        .ok_or(RejectReason::MissingField("state_name|state"))?;
    let region = region
        .as_str()
        .ok_or(RejectReason::EmptyField("state_name|state"))?;
    if region.is_empty() {
        return Err(RejectReason::EmptyField("state_name|state"));
    }

    let commodity = first_present(obj, &["commodity_desc", "commodity"])
        .ok_or(RejectReason::MissingField("commodity_desc|commodity"))?;
    let commodity = commodity
        .as_str()
        .ok_or(RejectReason::EmptyField("commodity_desc|commodity"))?;
    if commodity.is_empty() {
        return Err(RejectReason::EmptyField("commodity_desc|commodity"));
    }

    let year = first_present(obj, &["year", "Year"])
        .ok_or(RejectReason::MissingField("year|Year"))
        .and_then(|v| as_i32(v, "year"))?;

    let yield_value = first_present(obj, &["Value", "yield", "value"])
        .ok_or(RejectReason::MissingField("Value|yield|value"))
        .and_then(|v| as_f64(v, "yield"))?;

    Ok(YieldRecord {
        region: region.to_string(),
        commodity: commodity.to_string(),
        year,
        yield_value,
    })
}

/// Parse an upstream timestamp: RFC 3339 first, then a naive datetime,
/// then a bare date (midnight UTC). All naive inputs are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RejectReason> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Some(midnight) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(midnight.and_utc());
    }
    Err(RejectReason::UnparsableTimestamp(raw.to_string()))
}

fn first_present<'a>(
    obj: &'a serde_json::Map<String, Value>,
    keys: &[&str],
) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

fn require_string<'a>(
    obj: &'a serde_json::Map<String, Value>,
    field: &'static str,
) -> Result<&'a str, RejectReason> {
    let value = obj
        .get(field)
        .ok_or(RejectReason::MissingField(field))?
        .as_str()
        .ok_or(RejectReason::EmptyField(field))?;
    if value.is_empty() {
        return Err(RejectReason::EmptyField(field));
    }
    Ok(value)
}

fn as_f64(v: &Value, field: &'static str) -> Result<f64, RejectReason> {
    match v {
        Value::Number(n) => n.as_f64().ok_or(RejectReason::UnparsableNumber(field)),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| RejectReason::UnparsableNumber(field)),
        _ => Err(RejectReason::UnparsableNumber(field)),
    }
}

fn as_i32(v: &Value, field: &'static str) -> Result<i32, RejectReason> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .and_then(|y| i32::try_from(y).ok())
            .ok_or(RejectReason::UnparsableNumber(field)),
        Value::String(s) => s
            .parse::<i32>()
            .map_err(|_| RejectReason::UnparsableNumber(field)),
        _ => Err(RejectReason::UnparsableNumber(field)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_weather_valid() {
        let msg = json!({
            "station": "GHCND:USW00003952",
            "date": "2021-05-01T00:00:00Z",
            "datatype": "PRCP",
            "value": 0.5
        });

        let obs = parse_weather(&msg).unwrap();
        assert_eq!(obs.station, "GHCND:USW00003952");
        assert_eq!(obs.metric, MetricKind::Precipitation);
        assert_eq!(obs.value, 0.5);
    }

    #[test]
    fn test_parse_weather_time_key_fallback() {
        // "date" wins over "time" when both present; "time" alone works
        let msg = json!({
            "station": "S1",
            "time": "2021-05-01",
            "datatype": "TMAX",
            "value": 30
        });

        let obs = parse_weather(&msg).unwrap();
        assert_eq!(obs.metric, MetricKind::TempMax);
        assert_eq!(obs.timestamp.to_rfc3339(), "2021-05-01T00:00:00+00:00");
    }

    #[test]
    fn test_parse_weather_missing_fields() {
        let missing_station = json!({"date": "2021-05-01", "datatype": "PRCP", "value": 1.0});
        assert_eq!(
            parse_weather(&missing_station).unwrap_err(),
            RejectReason::MissingField("station")
        );

        let missing_value = json!({"station": "S1", "date": "2021-05-01", "datatype": "PRCP"});
        assert_eq!(
            parse_weather(&missing_value).unwrap_err(),
            RejectReason::MissingField("value")
        );
    }

    #[test]
    fn test_parse_weather_bad_timestamp() {
        let msg = json!({"station": "S1", "date": "not-a-date", "datatype": "PRCP", "value": 1.0});
        assert!(matches!(
            parse_weather(&msg).unwrap_err(),
            RejectReason::UnparsableTimestamp(_)
        ));
    }

    #[test]
    fn test_metric_kind_case_insensitive() {
        assert_eq!(MetricKind::from_datatype("prcp"), MetricKind::Precipitation);
        assert_eq!(MetricKind::from_datatype("Tmin"), MetricKind::TempMin);
        assert_eq!(
            MetricKind::from_datatype("SNOW"),
            MetricKind::Other("SNOW".to_string())
        );
    }

    #[test]
    fn test_parse_yield_canonical_keys() {
        let msg = json!({
            "state_name": "MISSOURI",
            "commodity_desc": "CORN",
            "year": 2021,
            "Value": 180.0
        });

        let rec = parse_yield(&msg).unwrap();
        assert_eq!(rec.region, "MISSOURI");
        assert_eq!(rec.commodity, "CORN");
        assert_eq!(rec.year, 2021);
        assert_eq!(rec.yield_value, 180.0);
    }

    #[test]
    fn test_parse_yield_alternate_spellings() {
        let msg = json!({
            "state": "IOWA",
            "commodity": "SOYBEANS",
            "Year": "2020",
            "yield": "52.5"
        });

        let rec = parse_yield(&msg).unwrap();
        assert_eq!(rec.region, "IOWA");
        assert_eq!(rec.year, 2020);
        assert_eq!(rec.yield_value, 52.5);
    }

    #[test]
    fn test_parse_yield_precedence_is_presence_not_truthiness() {
        // An explicit zero under the first key must not fall through to
        // a later spelling.
        let msg = json!({
            "state_name": "KANSAS",
            "commodity_desc": "WHEAT",
            "year": 2019,
            "Value": 0.0,
            "yield": 99.0
        });

        let rec = parse_yield(&msg).unwrap();
        assert_eq!(rec.yield_value, 0.0);
    }

    #[test]
    fn test_parse_yield_rejects_empty_region() {
        let msg = json!({
            "state_name": "",
            "commodity_desc": "CORN",
            "year": 2021,
            "Value": 180.0
        });
        assert_eq!(
            parse_yield(&msg).unwrap_err(),
            RejectReason::EmptyField("state_name|state")
        );
    }

    #[test]
    fn test_parse_yield_missing_everything() {
        assert_eq!(
            parse_yield(&json!({})).unwrap_err(),
            RejectReason::MissingField("state_name|state")
        );
        assert_eq!(parse_yield(&json!([1, 2])).unwrap_err(), RejectReason::NotAnObject);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert!(parse_timestamp("2021-05-01T12:30:00Z").is_ok());
        assert!(parse_timestamp("2021-05-01T12:30:00+02:00").is_ok());
        assert!(parse_timestamp("2021-05-01T12:30:00").is_ok());
        assert!(parse_timestamp("2021-05-01").is_ok());
        assert!(parse_timestamp("05/01/2021").is_err());
    }
}
