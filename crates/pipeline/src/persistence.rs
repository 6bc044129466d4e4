//! On-disk readings log
//!
//! A JSON array of the most recent readings, trimmed to a fixed number of
//! entries (oldest dropped) and rewritten atomically on every append.

use crate::buffer::{ReadingBuffer, DEFAULT_CAPACITY};
use crate::models::Reading;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A reading as persisted in the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedReading {
    pub sequence: u64,
    /// Unix seconds
    pub recorded_at: i64,
    pub reading: Reading,
}

impl LoggedReading {
    pub fn now(sequence: u64, reading: Reading) -> Self {
        Self {
            sequence,
            recorded_at: chrono::Utc::now().timestamp(),
            reading,
        }
    }
}

#[derive(Debug)]
pub struct ReadingsLog {
    path: PathBuf,
    entries: ReadingBuffer<LoggedReading>,
}

impl ReadingsLog {
    /// Open the log at `path`, loading and trimming any existing entries.
    ///
    /// An unreadable or corrupt file is logged and replaced on the next append.
    pub fn open(path: impl Into<PathBuf>, capacity: usize) -> Self {
        let path = path.into();
        let mut entries = ReadingBuffer::new(capacity);

        if path.exists() {
            match load_entries(&path) {
                Ok(loaded) => {
                    entries.extend(loaded);
                    info!(path = %path.display(), entries = entries.len(), "Loaded readings log");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %format!("{e:#}"), "Failed to load readings log, starting fresh");
                }
            }
        }

        Self { path, entries }
    }

    pub fn with_default_capacity(path: impl Into<PathBuf>) -> Self {
        Self::open(path, DEFAULT_CAPACITY)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append an entry and rewrite the file
    pub fn append(&mut self, entry: LoggedReading) -> Result<()> {
        self.entries.push(entry);
        self.save()
    }

    pub fn entries(&self) -> Vec<LoggedReading> {
        self.entries.snapshot()
    }

    /// The readings alone, oldest first
    pub fn readings(&self) -> Vec<Reading> {
        self.entries.iter().map(|e| e.reading.clone()).collect()
    }

    pub fn last_sequence(&self) -> Option<u64> {
        self.entries.last().map(|e| e.sequence)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }

        let json = serde_json::to_vec_pretty(&self.entries.snapshot())
            .context("Failed to serialize readings log")?;

        let temp_path = self.path.with_extension("tmp");
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&temp_path)
            .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;

        file.write_all(&json).context("Failed to write readings log")?;
        file.sync_all().context("Failed to sync readings log")?;

        std::fs::rename(&temp_path, &self.path)
            .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, self.path))?;

        debug!(path = %self.path.display(), entries = self.entries.len(), "Readings log written");
        Ok(())
    }
}

fn load_entries(path: &Path) -> Result<Vec<LoggedReading>> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_slice(&data).context("Failed to deserialize readings log")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::sample_reading;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_reload_trims_to_capacity() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("readings.json");

        let mut log = ReadingsLog::open(&path, 100);
        for sequence in 0..150 {
            log.append(LoggedReading::now(sequence, sample_reading())).unwrap();
        }
        assert_eq!(log.len(), 100);

        let reloaded = ReadingsLog::open(&path, 100);
        let entries = reloaded.entries();
        assert_eq!(entries.len(), 100);
        assert_eq!(entries[0].sequence, 50);
        assert_eq!(reloaded.last_sequence(), Some(149));
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_reload_with_smaller_capacity_keeps_newest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readings.json");

        let mut log = ReadingsLog::open(&path, 10);
        for sequence in 0..10 {
            log.append(LoggedReading::now(sequence, sample_reading())).unwrap();
        }

        let reloaded = ReadingsLog::open(&path, 3);
        let sequences: Vec<u64> = reloaded.entries().iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![7, 8, 9]);
    }

    #[test]
    fn test_missing_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let log = ReadingsLog::with_default_capacity(dir.path().join("absent.json"));
        assert!(log.is_empty());
        assert_eq!(log.last_sequence(), None);
    }

    #[test]
    fn test_corrupt_file_starts_empty_and_is_replaced() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("readings.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let mut log = ReadingsLog::open(&path, 100);
        assert!(log.is_empty());

        log.append(LoggedReading::now(0, sample_reading())).unwrap();
        assert_eq!(ReadingsLog::open(&path, 100).readings(), vec![sample_reading()]);
    }
}
