//! Fixed binary schema for enriched yield records
//!
//! Layout, little-endian throughout:
//!
//! ```text
//! u8            format version (currently 1)
//! u32 + bytes   region (UTF-8, length-prefixed)
//! u32 + bytes   commodity (UTF-8, length-prefixed)
//! i32           year
//! f64           yield value
//! u8 [+ f64]    avg_precipitation (0 = absent, 1 = present)
//! u8 [+ f64]    avg_temperature (0 = absent, 1 = present)
//! u32 + bytes   event_time (RFC 3339, UTF-8, length-prefixed)
//! ```
//!
//! Field order is part of the schema; decode rejects truncated buffers,
//! unknown tags and trailing bytes rather than guessing.

use super::types::EnrichedYieldRecord;
use chrono::{DateTime, Utc};

const FORMAT_VERSION: u8 = 1;

/// Why a buffer failed to decode (or a record failed to encode).
#[derive(Debug, Clone, PartialEq)]
pub enum CodecError {
    UnsupportedVersion(u8),
    Truncated,
    InvalidTag(u8),
    InvalidUtf8,
    InvalidTimestamp(String),
    TrailingBytes(usize),
}

impl std::fmt::Display for CodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodecError::UnsupportedVersion(v) => write!(f, "unsupported format version {}", v),
            CodecError::Truncated => write!(f, "buffer truncated"),
            CodecError::InvalidTag(t) => write!(f, "invalid option tag {}", t),
            CodecError::InvalidUtf8 => write!(f, "string field is not valid UTF-8"),
            CodecError::InvalidTimestamp(raw) => write!(f, "invalid event_time '{}'", raw),
            CodecError::TrailingBytes(n) => write!(f, "{} trailing bytes after record", n),
        }
    }
}

impl std::error::Error for CodecError {}

/// Encode a record into the fixed binary schema.
pub fn encode(record: &EnrichedYieldRecord) -> Vec<u8> {
    let event_time = record.event_time.to_rfc3339();

    let mut buf = Vec::with_capacity(
        1 + 4
            + record.region.len()
            + 4
            + record.commodity.len()
            + 4
            + 8
            + 9
            + 9
            + 4
            + event_time.len(),
    );

    buf.push(FORMAT_VERSION);
    put_string(&mut buf, &record.region);
    put_string(&mut buf, &record.commodity);
    buf.extend_from_slice(&record.year.to_le_bytes());
    buf.extend_from_slice(&record.yield_value.to_le_bytes());
    put_optional_f64(&mut buf, record.avg_precipitation);
    put_optional_f64(&mut buf, record.avg_temperature);
    put_string(&mut buf, &event_time);

    buf
}

/// Decode a buffer produced by [`encode`].
pub fn decode(buf: &[u8]) -> Result<EnrichedYieldRecord, CodecError> {
    let mut cursor = Cursor { buf, pos: 0 };

    let version = cursor.take_u8()?;
    if version != FORMAT_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }

    let region = cursor.take_string()?;
    let commodity = cursor.take_string()?;
    let year = i32::from_le_bytes(cursor.take_array::<4>()?);
    let yield_value = f64::from_le_bytes(cursor.take_array::<8>()?);
    let avg_precipitation = cursor.take_optional_f64()?;
    let avg_temperature = cursor.take_optional_f64()?;

    let event_time_raw = cursor.take_string()?;
    let event_time = DateTime::parse_from_rfc3339(&event_time_raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|_| CodecError::InvalidTimestamp(event_time_raw))?;

    if cursor.pos != buf.len() {
        return Err(CodecError::TrailingBytes(buf.len() - cursor.pos));
    }

    Ok(EnrichedYieldRecord {
        region,
        commodity,
        year,
        yield_value,
        avg_precipitation,
        avg_temperature,
        event_time,
    })
}

fn put_string(buf: &mut Vec<u8>, s: &str) {
    buf.extend_from_slice(&(s.len() as u32).to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
}

fn put_optional_f64(buf: &mut Vec<u8>, value: Option<f64>) {
    match value {
        Some(v) => {
            buf.push(1);
            buf.extend_from_slice(&v.to_le_bytes());
        }
        None => buf.push(0),
    }
}

struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Cursor<'_> {
    fn take_u8(&mut self) -> Result<u8, CodecError> {
        let byte = *self.buf.get(self.pos).ok_or(CodecError::Truncated)?;
        self.pos += 1;
        Ok(byte)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let end = self.pos.checked_add(N).ok_or(CodecError::Truncated)?;
        let slice = self.buf.get(self.pos..end).ok_or(CodecError::Truncated)?;
        self.pos = end;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn take_string(&mut self) -> Result<String, CodecError> {
        let len = u32::from_le_bytes(self.take_array::<4>()?) as usize;
        let end = self.pos.checked_add(len).ok_or(CodecError::Truncated)?;
        let slice = self.buf.get(self.pos..end).ok_or(CodecError::Truncated)?;
        self.pos = end;
        String::from_utf8(slice.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }

    fn take_optional_f64(&mut self) -> Result<Option<f64>, CodecError> {
        match self.take_u8()? {
            0 => Ok(None),
            1 => Ok(Some(f64::from_le_bytes(self.take_array::<8>()?))),
            tag => Err(CodecError::InvalidTag(tag)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_record() -> EnrichedYieldRecord {
        EnrichedYieldRecord {
            region: "MISSOURI".to_string(),
            commodity: "CORN".to_string(),
            year: 2021,
            yield_value: 180.0,
            avg_precipitation: Some(0.8),
            avg_temperature: Some(24.0),
            event_time: Utc.with_ymd_and_hms(2021, 9, 30, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_round_trip_full_record() {
        let record = sample_record();
        let decoded = decode(&encode(&record)).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_round_trip_absent_averages() {
        let record = EnrichedYieldRecord {
            avg_precipitation: None,
            avg_temperature: None,
            ..sample_record()
        };
        let decoded = decode(&encode(&record)).unwrap();
        assert_eq!(decoded.avg_precipitation, None);
        assert_eq!(decoded.avg_temperature, None);
        assert_eq!(decoded, record);
    }

    #[test]
    fn test_decode_rejects_truncation() {
        let encoded = encode(&sample_record());
        for cut in [0, 1, 5, encoded.len() / 2, encoded.len() - 1] {
            assert!(
                decode(&encoded[..cut]).is_err(),
                "decode should fail when cut at {}",
                cut
            );
        }
    }

    #[test]
    fn test_decode_rejects_trailing_bytes() {
        let mut encoded = encode(&sample_record());
        encoded.push(0xFF);
        assert_eq!(decode(&encoded).unwrap_err(), CodecError::TrailingBytes(1));
    }

    #[test]
    fn test_decode_rejects_bad_tag() {
        let record = sample_record();
        let mut encoded = encode(&record);
        // The avg_precipitation tag sits right after the fixed-width
        // year + yield fields.
        let tag_pos = 1 + 4 + record.region.len() + 4 + record.commodity.len() + 4 + 8;
        encoded[tag_pos] = 7;
        assert_eq!(decode(&encoded).unwrap_err(), CodecError::InvalidTag(7));
    }

    #[test]
    fn test_decode_rejects_unknown_version() {
        let mut encoded = encode(&sample_record());
        encoded[0] = 9;
        assert_eq!(decode(&encoded).unwrap_err(), CodecError::UnsupportedVersion(9));
    }
}
