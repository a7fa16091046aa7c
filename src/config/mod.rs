//! Configuration module
//!
//! Handles CLI argument parsing, the optional TOML configuration file, and validation.
//! Every section carries defaults, so running without a configuration file is the
//! normal case for a monitoring-agent plugin.

pub mod cli;
pub mod toml;
pub mod validator;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Complete sampler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding every persisted artifact
    pub state_dir: PathBuf,
    /// Shared file name prefix for the persisted artifacts
    pub prefix: String,
    pub workload: WorkloadConfig,
    pub sampler: SamplerConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from("/tmp"),
            prefix: "stress-ng-munin".to_string(),
            workload: WorkloadConfig::default(),
            sampler: SamplerConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Resolve the artifact paths for this configuration
    pub fn paths(&self) -> StatePaths {
        StatePaths::new(&self.state_dir, &self.prefix)
    }

    /// Check invariants serde cannot express
    pub fn validate(&self) -> crate::Result<()> {
        validator::validate_config(self)
    }
}

/// Workload generator invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    /// Program to run (looked up on PATH)
    pub program: String,
    /// Fixed arguments; `--yaml <artifact>` is appended on every run
    pub args: Vec<String>,
    /// Wall-clock bound on a single run, in seconds
    pub timeout_secs: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            program: "stress-ng".to_string(),
            args: "--cpu 1 --memrate 1 --iomix 1 --timeout 10s --metrics-brief"
                .split_whitespace()
                .map(String::from)
                .collect(),
            timeout_secs: 20,
        }
    }
}

impl WorkloadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Sampling loop and lease timing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    /// Terminate when no poll has been seen for this many seconds
    pub idle_timeout_secs: u64,
    /// How often the running daemon refreshes its lease
    pub heartbeat_interval_secs: u64,
    /// A lease older than this is reported as `Quit`
    pub lease_ttl_secs: u64,
    /// How long `start` waits for the launched daemon to publish its lease
    pub start_wait_secs: u64,
    /// How long `stop` waits for the daemon to release its lease
    pub stop_wait_secs: u64,
    /// Run `start` after every report so polling alone keeps the daemon alive
    pub autostart: bool,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 480,
            heartbeat_interval_secs: 5,
            lease_ttl_secs: 60,
            start_wait_secs: 5,
            stop_wait_secs: 5,
            autostart: false,
        }
    }
}

impl SamplerConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }

    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    pub fn start_wait(&self) -> Duration {
        Duration::from_secs(self.start_wait_secs)
    }

    pub fn stop_wait(&self) -> Duration {
        Duration::from_secs(self.stop_wait_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive (e.g. "info", "stressmon=debug")
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Locations of the persisted artifacts
///
/// All artifacts share `<state_dir>/<prefix>` and differ only by suffix, so a
/// single prefix identifies one sampler instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    /// Process handle lease (JSON)
    pub handle: PathBuf,
    /// Sample log (JSON lines)
    pub samples: PathBuf,
    /// Transient workload output
    pub artifact: PathBuf,
    /// Last poll heartbeat written by the report emitter
    pub poll: PathBuf,
    /// Daemon stderr
    pub daemon_log: PathBuf,
    /// Instance lock held by the running daemon for its whole lifetime
    pub lock: PathBuf,
}

impl StatePaths {
    pub fn new(state_dir: &Path, prefix: &str) -> Self {
        let at = |suffix: &str| state_dir.join(format!("{}.{}", prefix, suffix));
        Self {
            handle: at("pid"),
            samples: at("samples"),
            artifact: at("yaml"),
            poll: at("poll"),
            daemon_log: at("log"),
            lock: at("lock"),
        }
    }

    /// Artifacts removed when the daemon exits
    ///
    /// The daemon log is kept so the reason for the exit stays inspectable. The lock
    /// file is kept too: unlinking it while another process waits on it would let two
    /// holders lock different inodes.
    pub fn transient(&self) -> [&Path; 4] {
        [&self.handle, &self.samples, &self.artifact, &self.poll]
    }
}
