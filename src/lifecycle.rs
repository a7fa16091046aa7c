//! Daemon lifecycle commands
//!
//! `stop` and `status` only ever look at the process handle lease; they never
//! inspect the process table to decide whether the daemon is alive. `start` asks
//! the instance lock instead, which the kernel releases the moment a daemon dies.
//!
//! # States
//!
//! - **Stopped**: no handle exists
//! - **Running**: the handle's heartbeat is within the lease TTL
//! - **Quit**: a handle exists but is stale or unreadable (the daemon died without
//!   cleaning up)

use crate::config::Config;
use crate::daemon::cleanup::remove_artifacts;
use crate::daemon::lease::Lease;
use crate::store::lock::InstanceLock;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::Path;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};

/// Lifecycle failures the command line reports specially
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("stress-ng not running")]
    NotRunning,

    #[error("sampler (pid {pid}) runs on {host}, not on this host")]
    ForeignHost { pid: u32, host: String },

    #[error("failed to signal sampler (pid {pid}): {source}")]
    Signal {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

/// Daemon state as derived from the process handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DaemonState {
    Stopped,
    Quit,
    Running,
}

impl fmt::Display for DaemonState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DaemonState::Stopped => "Stopped",
            DaemonState::Quit => "Quit",
            DaemonState::Running => "Running",
        };
        f.write_str(name)
    }
}

/// Current state of the daemon
pub fn status(config: &Config) -> DaemonState {
    state_at(&config.paths().handle, config.sampler.lease_ttl(), Utc::now())
}

/// State of the handle at `path` as of `now`
pub fn state_at(path: &Path, ttl: Duration, now: DateTime<Utc>) -> DaemonState {
    match Lease::load(path) {
        Ok(None) => DaemonState::Stopped,
        Ok(Some(lease)) if lease.is_fresh(now, ttl) => DaemonState::Running,
        Ok(Some(lease)) => {
            info!(pid = lease.pid, age_secs = lease.age(now).as_secs(), "stale lease");
            DaemonState::Quit
        }
        Err(e) => {
            warn!(error = %e, "unreadable lease");
            DaemonState::Quit
        }
    }
}

/// What `start` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    AlreadyRunning,
    /// `ready` tells whether a daemon published a fresh handle within the start wait
    Launched { pid: u32, ready: bool },
}

/// Start the daemon unless it is already running
///
/// The instance lock decides whether a daemon is alive: if nobody holds it, any
/// handle on disk is left over from a daemon that died, and its artifacts are
/// cleared while the lock is held so a concurrently starting daemon cannot publish
/// in between. The handle itself is only ever written by the daemon; `start` waits
/// up to `start_wait` for it to appear.
///
/// # Arguments
///
/// * `config` - Sampler configuration
/// * `launch` - Starts the daemon process and returns its pid
pub fn start<F>(config: &Config, launch: F) -> Result<StartOutcome>
where
    F: FnOnce() -> Result<u32>,
{
    let paths = config.paths();

    {
        let Some(_lock) = InstanceLock::try_acquire(&paths.lock, Duration::ZERO)? else {
            info!("sampler already running");
            return Ok(StartOutcome::AlreadyRunning);
        };
        if status(config) != DaemonState::Stopped {
            let removed = remove_artifacts(&paths);
            warn!(removed, "cleared artifacts of a sampler that quit");
        }
    }

    let pid = launch()?;
    info!(pid, "sampler launched");

    let published = wait_for_lease(
        &paths.handle,
        config.sampler.lease_ttl(),
        config.sampler.start_wait(),
    );
    match &published {
        Some(lease) => info!(owner = lease.pid, "sampler published its handle"),
        None => warn!(
            pid,
            wait_secs = config.sampler.start_wait().as_secs(),
            "sampler did not publish a handle in time"
        ),
    }

    Ok(StartOutcome::Launched {
        pid,
        ready: published.is_some(),
    })
}

/// Launch `<current exe> [--config <path>] run` as a detached session leader
///
/// stdin and stdout go to `/dev/null`; stderr is appended to the daemon log so the
/// daemon's tracing output survives.
pub fn launch_detached(config: &Config, config_path: Option<&Path>) -> Result<u32> {
    use std::os::unix::process::CommandExt;
    use std::process::{Command, Stdio};

    let exe_path = std::env::current_exe()
        .context("Failed to get current executable path")?;
    let paths = config.paths();

    let mut cmd = Command::new(&exe_path);
    if let Some(path) = config_path {
        // The daemon must not depend on the caller's working directory
        let path = std::fs::canonicalize(path)
            .with_context(|| format!("Failed to resolve config path: {}", path.display()))?;
        cmd.arg("--config").arg(path);
    }
    cmd.arg("run");

    std::fs::create_dir_all(&config.state_dir)
        .with_context(|| format!("Failed to create state dir: {}", config.state_dir.display()))?;
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&paths.daemon_log)
        .with_context(|| format!("Failed to open daemon log: {}", paths.daemon_log.display()))?;

    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::from(log_file));

    // Detach from the poller's session so its exit does not take the daemon along
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let child = cmd.spawn().context("Failed to launch sampler")?;
    Ok(child.id())
}

/// What `stop` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The handle was stale; its artifacts were removed
    ClearedStale { pid: u32 },
    /// SIGTERM was delivered; `released` tells whether the daemon removed its handle
    /// within the wait period
    Signalled { pid: u32, released: bool },
}

/// Ask the running daemon to terminate
///
/// # Errors
///
/// [`LifecycleError::NotRunning`] when no handle exists, and
/// [`LifecycleError::ForeignHost`] when a live handle belongs to another host.
pub fn stop(config: &Config) -> Result<StopOutcome> {
    let paths = config.paths();
    let now = Utc::now();

    let lease = match Lease::load(&paths.handle) {
        Ok(Some(lease)) => lease,
        Ok(None) => return Err(LifecycleError::NotRunning.into()),
        Err(e) => {
            warn!(error = %e, "clearing unreadable process handle");
            remove_artifacts(&paths);
            return Ok(StopOutcome::ClearedStale { pid: 0 });
        }
    };

    if !lease.is_fresh(now, config.sampler.lease_ttl()) {
        info!(pid = lease.pid, "sampler already quit, clearing artifacts");
        remove_artifacts(&paths);
        return Ok(StopOutcome::ClearedStale { pid: lease.pid });
    }

    if !lease.is_local() {
        return Err(LifecycleError::ForeignHost {
            pid: lease.pid,
            host: lease.host,
        }
        .into());
    }

    match send_terminate(lease.pid) {
        Ok(()) => {}
        Err(e) if e.raw_os_error() == Some(libc::ESRCH) => {
            info!(pid = lease.pid, "sampler vanished, clearing artifacts");
            remove_artifacts(&paths);
            return Ok(StopOutcome::ClearedStale { pid: lease.pid });
        }
        Err(source) => {
            return Err(LifecycleError::Signal {
                pid: lease.pid,
                source,
            }
            .into())
        }
    }

    let released = wait_for_release(&paths.handle, lease.pid, config.sampler.stop_wait());
    if released {
        info!(pid = lease.pid, "sampler stopped");
    } else {
        warn!(
            pid = lease.pid,
            wait_secs = config.sampler.stop_wait().as_secs(),
            "sampler did not release its handle in time"
        );
    }

    Ok(StopOutcome::Signalled {
        pid: lease.pid,
        released,
    })
}

fn send_terminate(pid: u32) -> std::io::Result<()> {
    let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
    if result == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}

/// Wait until a fresh handle exists
fn wait_for_lease(handle: &Path, ttl: Duration, wait: Duration) -> Option<Lease> {
    let deadline = Instant::now() + wait;
    loop {
        if let Ok(Some(lease)) = Lease::load(handle) {
            if lease.is_fresh(Utc::now(), ttl) {
                return Some(lease);
            }
        }
        if Instant::now() >= deadline {
            return None;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

/// Wait until the handle is gone or owned by another pid
fn wait_for_release(handle: &Path, pid: u32, wait: Duration) -> bool {
    let deadline = Instant::now() + wait;
    loop {
        match Lease::load(handle) {
            Ok(None) => return true,
            Ok(Some(lease)) if lease.pid != pid => return true,
            _ => {}
        }
        if Instant::now() >= deadline {
            return false;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
}
