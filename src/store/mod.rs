//! Persisted sample queue and poll heartbeat
//!
//! The sample log is a single-producer/single-consumer queue kept on disk so it
//! survives daemon restarts and is visible to the short-lived report invocations.
//! The sampling loop is the only writer ([`SampleLog::append`]); the report emitter is
//! the only reader and consumes the whole window at once ([`SampleLog::drain`]).
//!
//! Both operations hold an exclusive lock on the log file for their whole duration,
//! and the drain truncates while still holding it. A record is therefore reported by
//! exactly one poll, no matter how an append and a drain interleave.
//!
//! Format: one JSON object per line, `{"at": "<rfc3339>", "values": [cpu, memrate,
//! iomix, exit_code]}`.

pub mod lock;

use crate::stats::Measurement;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use lock::LockGuard;
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

/// One line of the sample log
#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    at: DateTime<Utc>,
    #[serde(flatten)]
    sample: Measurement,
}

/// Durable append log of measurement records
#[derive(Debug, Clone)]
pub struct SampleLog {
    path: PathBuf,
}

impl SampleLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record, creating the log if needed
    pub fn append(&self, sample: &Measurement) -> Result<()> {
        let mut line = serde_json::to_string(&Entry {
            at: Utc::now(),
            sample: *sample,
        })
        .context("Failed to serialize sample")?;
        line.push('\n');

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open sample log: {}", self.path.display()))?;

        let _guard = LockGuard::exclusive(&file)?;
        (&file)
            .write_all(line.as_bytes())
            .with_context(|| format!("Failed to append to sample log: {}", self.path.display()))?;

        Ok(())
    }

    /// Read every pending record and empty the log
    ///
    /// A missing log is an empty window. Lines that fail to decode are skipped.
    pub fn drain(&self) -> Result<Vec<Measurement>> {
        let file = match OpenOptions::new().read(true).write(true).open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to open sample log: {}", self.path.display())
                })
            }
        };

        let _guard = LockGuard::exclusive(&file)?;

        let mut contents = String::new();
        (&file)
            .read_to_string(&mut contents)
            .with_context(|| format!("Failed to read sample log: {}", self.path.display()))?;
        file.set_len(0)
            .with_context(|| format!("Failed to truncate sample log: {}", self.path.display()))?;

        Ok(decode(&contents))
    }
}

fn decode(contents: &str) -> Vec<Measurement> {
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match serde_json::from_str::<Entry>(line) {
            Ok(entry) => Some(entry.sample),
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed sample log line");
                None
            }
        })
        .collect()
}

/// Timestamp of the most recent poll
///
/// Written by the report emitter on every poll; the sampling loop reads it to decide
/// whether anyone is still consuming samples.
#[derive(Debug, Clone)]
pub struct PollStamp {
    path: PathBuf,
}

impl PollStamp {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Record a poll at `at`
    pub fn touch(&self, at: DateTime<Utc>) -> Result<()> {
        write_atomic(&self.path, at.to_rfc3339().as_bytes())
    }

    /// Last recorded poll, if any
    ///
    /// An unreadable stamp counts as no poll at all.
    pub fn last(&self) -> Result<Option<DateTime<Utc>>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to read poll stamp: {}", self.path.display()))
            }
        };

        match DateTime::parse_from_rfc3339(contents.trim()) {
            Ok(at) => Ok(Some(at.with_timezone(&Utc))),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "ignoring unreadable poll stamp"
                );
                Ok(None)
            }
        }
    }
}

/// Replace `path` with `contents` via a temp file and rename
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let mut temp = path.as_os_str().to_owned();
    temp.push(format!(".{}.tmp", std::process::id()));
    let temp = PathBuf::from(temp);

    fs::write(&temp, contents)
        .with_context(|| format!("Failed to write {}", temp.display()))?;
    fs::rename(&temp, path)
        .with_context(|| format!("Failed to rename {} to {}", temp.display(), path.display()))?;

    Ok(())
}

/// Remove a file, treating an already missing file as success
pub(crate) fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("Failed to remove {}", path.display())),
    }
}
