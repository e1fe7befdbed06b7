//! Incident persistence
//!
//! Incidents are append-only rows; the only updates ever made are the
//! acknowledgment fields and `last_notified`. The store is a trait so
//! tests can substitute in-memory or failing implementations; production
//! uses SQLite.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// One alert episode for a stream, from detection through acknowledgment.
#[derive(Debug, Clone, PartialEq)]
pub struct Incident {
    pub id: i64,
    pub stream_name: String,
    pub incident_type: String,
    pub first_detected: DateTime<Utc>,
    pub last_notified: DateTime<Utc>,
    pub acknowledged: bool,
    pub ack_timestamp: Option<DateTime<Utc>>,
    pub details: String,
}

/// Durable incident log.
#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Append a new incident with `first_detected = last_notified =
    /// detected_at` and `acknowledged = false`. Returns the row id.
    async fn append(
        &self,
        stream_name: &str,
        incident_type: &str,
        detected_at: DateTime<Utc>,
        details: &str,
    ) -> Result<i64, BoxError>;

    /// Mark every unacknowledged incident for the stream as acknowledged
    /// at `at`. Returns the number of rows updated.
    async fn acknowledge(&self, stream_name: &str, at: DateTime<Utc>) -> Result<usize, BoxError>;

    /// All incidents for a stream, oldest first.
    async fn incidents_for_stream(&self, stream_name: &str) -> Result<Vec<Incident>, BoxError>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS incidents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    stream_name TEXT NOT NULL,
    incident_type TEXT NOT NULL,
    first_detected TEXT NOT NULL,
    last_notified TEXT NOT NULL,
    acknowledged INTEGER NOT NULL DEFAULT 0,
    ack_timestamp TEXT,
    details TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_incidents_stream
    ON incidents (stream_name, acknowledged);
";

/// SQLite-backed incident store.
///
/// Timestamps are stored as RFC 3339 text. The schema is applied
/// idempotently at open, along with WAL mode.
pub struct SqliteIncidentStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteIncidentStore {
    pub fn open(db_path: &str) -> Result<Self, BoxError> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute_batch(SCHEMA)?;
        log::info!("📊 Incident store ready at {}", db_path);

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl IncidentStore for SqliteIncidentStore {
    async fn append(
        &self,
        stream_name: &str,
        incident_type: &str,
        detected_at: DateTime<Utc>,
        details: &str,
    ) -> Result<i64, BoxError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO incidents
             (stream_name, incident_type, first_detected, last_notified, acknowledged, details)
             VALUES (?1, ?2, ?3, ?3, 0, ?4)",
            rusqlite::params![
                stream_name,
                incident_type,
                detected_at.to_rfc3339(),
                details
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn acknowledge(&self, stream_name: &str, at: DateTime<Utc>) -> Result<usize, BoxError> {
        let conn = self.conn.lock().unwrap();
        let updated = conn.execute(
            "UPDATE incidents SET acknowledged = 1, ack_timestamp = ?1
             WHERE stream_name = ?2 AND acknowledged = 0",
            rusqlite::params![at.to_rfc3339(), stream_name],
        )?;
        Ok(updated)
    }

    async fn incidents_for_stream(&self, stream_name: &str) -> Result<Vec<Incident>, BoxError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, stream_name, incident_type, first_detected, last_notified,
                    acknowledged, ack_timestamp, details
             FROM incidents WHERE stream_name = ?1 ORDER BY id",
        )?;

        let rows = stmt.query_map([stream_name], |row| {
            Ok(Incident {
                id: row.get(0)?,
                stream_name: row.get(1)?,
                incident_type: row.get(2)?,
                first_detected: parse_ts(row, 3)?,
                last_notified: parse_ts(row, 4)?,
                acknowledged: row.get::<_, i64>(5)? != 0,
                ack_timestamp: match row.get::<_, Option<String>>(6)? {
                    Some(raw) => Some(parse_ts_str(&raw, 6)?),
                    None => None,
                },
                details: row.get(7)?,
            })
        })?;

        let mut incidents = Vec::new();
        for row in rows {
            incidents.push(row?);
        }
        Ok(incidents)
    }
}

fn parse_ts(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts_str(&raw, idx)
}

fn parse_ts_str(raw: &str, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::NamedTempFile;

    fn open_test_store() -> (NamedTempFile, SqliteIncidentStore) {
        let temp = NamedTempFile::new().unwrap();
        let store = SqliteIncidentStore::open(temp.path().to_str().unwrap()).unwrap();
        (temp, store)
    }

    fn ts(min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 5, 1, 12, min, 0).unwrap()
    }

    #[tokio::test]
    async fn test_append_then_read_back() {
        let (_temp, store) = open_test_store();

        let id = store
            .append("weather-feed", "down", ts(0), "No data since 11:58")
            .await
            .unwrap();
        assert!(id > 0);

        let incidents = store.incidents_for_stream("weather-feed").await.unwrap();
        assert_eq!(incidents.len(), 1);
        let incident = &incidents[0];
        assert_eq!(incident.stream_name, "weather-feed");
        assert_eq!(incident.incident_type, "down");
        assert_eq!(incident.first_detected, ts(0));
        assert_eq!(incident.last_notified, ts(0));
        assert!(!incident.acknowledged);
        assert_eq!(incident.ack_timestamp, None);
    }

    #[tokio::test]
    async fn test_acknowledge_updates_open_incidents_only() {
        let (_temp, store) = open_test_store();

        store
            .append("weather-feed", "down", ts(0), "first")
            .await
            .unwrap();
        assert_eq!(store.acknowledge("weather-feed", ts(1)).await.unwrap(), 1);

        // Second episode; the first must stay acknowledged with its
        // original timestamp.
        store
            .append("weather-feed", "down", ts(2), "second")
            .await
            .unwrap();
        assert_eq!(store.acknowledge("weather-feed", ts(3)).await.unwrap(), 1);

        let incidents = store.incidents_for_stream("weather-feed").await.unwrap();
        assert_eq!(incidents.len(), 2);
        assert_eq!(incidents[0].ack_timestamp, Some(ts(1)));
        assert_eq!(incidents[1].ack_timestamp, Some(ts(3)));
    }

    #[tokio::test]
    async fn test_acknowledge_without_open_incident_touches_nothing() {
        let (_temp, store) = open_test_store();
        assert_eq!(store.acknowledge("ghost", ts(0)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_streams_are_isolated() {
        let (_temp, store) = open_test_store();

        store.append("a", "down", ts(0), "a down").await.unwrap();
        store.append("b", "down", ts(0), "b down").await.unwrap();
        store.acknowledge("a", ts(1)).await.unwrap();

        let b = store.incidents_for_stream("b").await.unwrap();
        assert_eq!(b.len(), 1);
        assert!(!b[0].acknowledged);
    }

    #[tokio::test]
    async fn test_reopen_preserves_rows() {
        let temp = NamedTempFile::new().unwrap();
        let path = temp.path().to_str().unwrap().to_string();

        {
            let store = SqliteIncidentStore::open(&path).unwrap();
            store.append("s", "down", ts(0), "persisted").await.unwrap();
        }

        let store = SqliteIncidentStore::open(&path).unwrap();
        let incidents = store.incidents_for_stream("s").await.unwrap();
        assert_eq!(incidents.len(), 1);
        assert_eq!(incidents[0].details, "persisted");
    }
}
