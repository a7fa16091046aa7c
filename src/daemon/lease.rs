//! Process handle lease
//!
//! The running daemon identifies itself with a small JSON record at the handle path:
//! its pid, the host it runs on, when it started and when it last proved it was alive.
//! A separate task refreshes `heartbeat_at` on a fixed interval, so liveness is read
//! from the record's age instead of probing the pid (which the kernel may have reused).

use crate::store::write_atomic;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::time::Duration;

/// Persisted identity of the running daemon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub pid: u32,
    pub host: String,
    pub started_at: DateTime<Utc>,
    pub heartbeat_at: DateTime<Utc>,
}

impl Lease {
    /// Fresh lease for `pid` on this host
    pub fn new(pid: u32, at: DateTime<Utc>) -> Self {
        Self {
            pid,
            host: local_host(),
            started_at: at,
            heartbeat_at: at,
        }
    }

    /// Load the lease at `path`
    ///
    /// # Returns
    ///
    /// `Ok(None)` when no lease exists; an error when one exists but cannot be read
    /// or decoded.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read lease: {}", path.display()))
            }
        };

        let lease = serde_json::from_str(&contents)
            .with_context(|| format!("Malformed lease: {}", path.display()))?;
        Ok(Some(lease))
    }

    /// Atomically write this lease to `path`
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self).context("Failed to serialize lease")?;
        write_atomic(path, &json)
    }

    /// Move the heartbeat forward to `at`
    pub fn refresh(&mut self, at: DateTime<Utc>) {
        self.heartbeat_at = at;
    }

    /// Time since the last heartbeat, zero if the heartbeat lies in the future
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.heartbeat_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Whether the owner runs on this host
    pub fn is_local(&self) -> bool {
        self.host == local_host()
    }

    /// Whether the owner refreshed the lease within `ttl`
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age(now) <= ttl
    }
}

fn local_host() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}
