//! Framed binary file sink for enriched records
//!
//! Appends each encoded record as a u32 little-endian length prefix
//! followed by the payload. Writes are buffered; `flush` is explicit and
//! the correlation runtime calls it on its flush cadence and at
//! shutdown.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

#[derive(Debug)]
pub enum WriterError {
    Io(std::io::Error),
}

impl std::fmt::Display for WriterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WriterError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for WriterError {}

impl From<std::io::Error> for WriterError {
    fn from(e: std::io::Error) -> Self {
        WriterError::Io(e)
    }
}

pub struct RecordFileWriter {
    file: BufWriter<File>,
    records_written: u64,
}

impl RecordFileWriter {
    /// Open (or create) the sink file in append mode, creating parent
    /// directories as needed.
    pub fn new(path: impl AsRef<Path>) -> Result<Self, WriterError> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            file: BufWriter::new(file),
            records_written: 0,
        })
    }

    /// Append one length-prefixed record.
    pub fn append(&mut self, record: &[u8]) -> Result<(), WriterError> {
        self.file.write_all(&(record.len() as u32).to_le_bytes())?;
        self.file.write_all(record)?;
        self.records_written += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), WriterError> {
        self.file.flush()?;
        Ok(())
    }

    pub fn records_written(&self) -> u64 {
        self.records_written
    }
}

/// Read back every framed record from a sink file. Used by diagnostics
/// and tests; tolerant of nothing - a short frame is an error.
pub fn read_frames(path: impl AsRef<Path>) -> Result<Vec<Vec<u8>>, WriterError> {
    let data = std::fs::read(path)?;
    let mut frames = Vec::new();
    let mut pos = 0usize;

    while pos < data.len() {
        if pos + 4 > data.len() {
            return Err(WriterError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "truncated frame header",
            )));
        }
        let len = u32::from_le_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]])
            as usize;
        pos += 4;
        if pos + len > data.len() {
            return Err(WriterError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "truncated frame body",
            )));
        }
        frames.push(data[pos..pos + len].to_vec());
        pos += len;
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_append_flush_and_read_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.dat");

        let mut writer = RecordFileWriter::new(&path).unwrap();
        writer.append(b"first").unwrap();
        writer.append(b"second record").unwrap();
        writer.flush().unwrap();
        assert_eq!(writer.records_written(), 2);

        let frames = read_frames(&path).unwrap();
        assert_eq!(frames, vec![b"first".to_vec(), b"second record".to_vec()]);
    }

    #[test]
    fn test_append_mode_preserves_existing_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("records.dat");

        {
            let mut writer = RecordFileWriter::new(&path).unwrap();
            writer.append(b"one").unwrap();
            writer.flush().unwrap();
        }
        {
            let mut writer = RecordFileWriter::new(&path).unwrap();
            writer.append(b"two").unwrap();
            writer.flush().unwrap();
        }

        let frames = read_frames(&path).unwrap();
        assert_eq!(frames.len(), 2);
    }

    #[test]
    fn test_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/deeper/records.dat");

        let mut writer = RecordFileWriter::new(&path).unwrap();
        writer.append(b"x").unwrap();
        writer.flush().unwrap();
        assert!(path.exists());
    }
}
