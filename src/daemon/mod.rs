//! Background sampling daemon
//!
//! Runs the workload back to back, appending one record per run to the sample log,
//! until nobody has polled for `idle_timeout`. While it runs it holds the process
//! handle lease and refreshes it from a separate heartbeat task.
//!
//! # Features
//!
//! - Idle self-termination driven by the poll stamp the report emitter writes
//! - Lease heartbeat independent of how long a single workload run takes
//! - Graceful exit on SIGINT, SIGTERM, SIGQUIT and SIGHUP
//! - Artifact cleanup on every unwinding exit path via [`cleanup::CleanupGuard`]

pub mod cleanup;
pub mod lease;

use crate::config::{Config, StatePaths};
use crate::store::lock::InstanceLock;
use crate::store::{PollStamp, SampleLog};
use crate::workload::Workload;
use crate::Result;
use anyhow::Context;
use chrono::{DateTime, Utc};
use cleanup::CleanupGuard;
use lease::Lease;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::signal::unix::{signal, Signal, SignalKind};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Why the daemon stopped
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// No poll within the idle timeout
    Idle { idle: Duration, runs: u64 },
    /// A termination signal arrived
    Signal(&'static str),
    /// Another daemon holds the instance lock
    Superseded,
}

/// Time since the last sign of a consumer
///
/// Polls older than the daemon itself do not count: a freshly started daemon always
/// gets a full idle timeout.
pub fn idle_age(
    now: DateTime<Utc>,
    started_at: DateTime<Utc>,
    last_poll: Option<DateTime<Utc>>,
) -> Duration {
    let reference = last_poll.map_or(started_at, |poll| poll.max(started_at));
    (now - reference).to_std().unwrap_or(Duration::ZERO)
}

/// The sampling loop
pub struct Sampler<W> {
    workload: W,
    log: SampleLog,
    poll: PollStamp,
    idle_timeout: Duration,
    started_at: DateTime<Utc>,
}

impl<W: Workload> Sampler<W> {
    pub fn new(workload: W, paths: &StatePaths, idle_timeout: Duration) -> Self {
        Self {
            workload,
            log: SampleLog::new(&paths.samples),
            poll: PollStamp::new(&paths.poll),
            idle_timeout,
            started_at: Utc::now(),
        }
    }

    /// Sample until idle
    ///
    /// Every run yields exactly one record, failed runs included. The idle check happens
    /// after each append, so even a zero idle timeout records one sample.
    pub async fn run(&mut self) -> Result<Termination> {
        let mut runs = 0u64;

        loop {
            let outcome = self.workload.run().await;
            let sample = outcome.measurement();
            self.log.append(&sample)?;
            runs += 1;
            debug!(runs, exit_code = sample.exit_code(), "recorded sample");

            let last_poll = self.poll.last().unwrap_or_else(|e| {
                warn!(error = %e, "cannot read poll stamp");
                None
            });
            let idle = idle_age(Utc::now(), self.started_at, last_poll);
            if idle >= self.idle_timeout {
                info!(idle_secs = idle.as_secs(), runs, "no poll within idle timeout, stopping");
                return Ok(Termination::Idle { idle, runs });
            }
        }
    }
}

/// How long a starting daemon waits for the instance lock
///
/// `start` holds the lock briefly while clearing stale artifacts, so a fresh daemon
/// retries for a moment before concluding that another instance owns it.
const LOCK_WAIT: Duration = Duration::from_secs(1);

/// Run the daemon to completion in the current process
///
/// Termination signals are handled from the first line on, before anything is
/// written. Only the holder of the instance lock writes the process handle and the
/// sample log; a daemon that cannot take the lock returns
/// [`Termination::Superseded`] without touching any artifact.
pub async fn run_daemon<W: Workload>(config: &Config, workload: W) -> Result<Termination> {
    let mut signals = ShutdownSignals::install()?;
    let paths = config.paths();
    let pid = std::process::id();

    let lock_path = paths.lock.clone();
    let acquired =
        tokio::task::spawn_blocking(move || InstanceLock::try_acquire(&lock_path, LOCK_WAIT))
            .await
            .context("Instance lock task failed")??;
    let Some(_instance) = acquired else {
        info!(pid, "another sampler holds the instance lock");
        return Ok(Termination::Superseded);
    };

    // Holding the lock means any handle on disk belongs to a dead daemon
    if let Ok(Some(stale)) = Lease::load(&paths.handle) {
        info!(pid = stale.pid, "replacing stale process handle");
    }

    let lease = Lease::new(pid, Utc::now());
    lease.save(&paths.handle).context("Failed to acquire lease")?;
    let _cleanup = CleanupGuard::new(&paths);
    info!(
        pid,
        host = %lease.host,
        state_dir = %config.state_dir.display(),
        "sampler started"
    );

    let mut heartbeat =
        HeartbeatTask::spawn(paths.handle.clone(), lease, config.sampler.heartbeat_interval());

    let mut sampler = Sampler::new(workload, &paths, config.sampler.idle_timeout());
    let result = tokio::select! {
        result = sampler.run() => result,
        signal = signals.recv() => Ok(Termination::Signal(signal)),
    };

    heartbeat.stop().await;

    match &result {
        Ok(termination) => info!(?termination, "sampler stopped"),
        Err(e) => error!(error = %e, "sampler failed"),
    }
    result
}

/// Lease refresher running beside the sampling loop
///
/// Every refresh happens under the `stopped` mutex, and stopping sets the flag under
/// the same mutex. Once [`HeartbeatTask::halt`] returns, no write can land anymore,
/// so the handle stays gone after cleanup removes it.
struct HeartbeatTask {
    handle: JoinHandle<()>,
    stopped: Arc<Mutex<bool>>,
}

impl HeartbeatTask {
    fn spawn(path: PathBuf, lease: Lease, every: Duration) -> Self {
        let stopped = Arc::new(Mutex::new(false));
        let handle = tokio::spawn(heartbeat_loop(path, lease, every, Arc::clone(&stopped)));
        Self { handle, stopped }
    }

    /// Prevent any further write and cancel the task
    fn halt(&self) {
        *self.stopped.lock().unwrap_or_else(PoisonError::into_inner) = true;
        self.handle.abort();
    }

    /// Halt and wait until the task has finished
    async fn stop(&mut self) {
        self.halt();
        let _ = (&mut self.handle).await;
    }
}

impl Drop for HeartbeatTask {
    fn drop(&mut self) {
        self.halt();
    }
}

/// Keep the lease fresh until halted
async fn heartbeat_loop(
    path: PathBuf,
    mut lease: Lease,
    every: Duration,
    stopped: Arc<Mutex<bool>>,
) {
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately and the lease was just written
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let halted = stopped.lock().unwrap_or_else(PoisonError::into_inner);
        if *halted {
            return;
        }
        lease.refresh(Utc::now());
        if let Err(e) = lease.save(&path) {
            warn!(error = %e, "failed to refresh lease");
        }
    }
}

/// Termination signal streams, registered before the daemon publishes itself
struct ShutdownSignals {
    interrupt: Signal,
    terminate: Signal,
    quit: Signal,
    hangup: Signal,
}

impl ShutdownSignals {
    fn install() -> Result<Self> {
        let listen = |kind: SignalKind, name: &str| {
            signal(kind).with_context(|| format!("Failed to install {} handler", name))
        };

        Ok(Self {
            interrupt: listen(SignalKind::interrupt(), "SIGINT")?,
            terminate: listen(SignalKind::terminate(), "SIGTERM")?,
            quit: listen(SignalKind::quit(), "SIGQUIT")?,
            hangup: listen(SignalKind::hangup(), "SIGHUP")?,
        })
    }

    /// Wait for the first termination signal and return its name
    async fn recv(&mut self) -> &'static str {
        let name = tokio::select! {
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.quit.recv() => "SIGQUIT",
            _ = self.hangup.recv() => "SIGHUP",
        };
        info!(signal = name, "received termination signal");
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Metric;
    use crate::workload::mock::{stress_output, MockWorkload};
    use crate::workload::RunOutcome;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.state_dir = dir.path().to_path_buf();
        config.prefix = "test".to_string();
        config
    }

    #[test]
    fn test_idle_age_without_poll() {
        let start = Utc::now();
        let now = start + chrono::Duration::seconds(30);
        assert_eq!(idle_age(now, start, None), Duration::from_secs(30));
    }

    #[test]
    fn test_idle_age_uses_latest_reference() {
        let start = Utc::now();
        let now = start + chrono::Duration::seconds(600);

        let recent = Some(start + chrono::Duration::seconds(590));
        assert_eq!(idle_age(now, start, recent), Duration::from_secs(10));

        // A poll from before the daemon started does not shorten its grace period
        let stale = Some(start - chrono::Duration::seconds(3600));
        assert_eq!(idle_age(now, start, stale), Duration::from_secs(600));
    }

    #[tokio::test]
    async fn test_sampler_records_every_run() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let paths = config.paths();
        let workload = MockWorkload::new(vec![
            RunOutcome::new(0, stress_output(10.0, 1.0, 1.0)),
            RunOutcome::failed(124),
            RunOutcome::new(0, stress_output(30.0, 1.0, 1.0)),
        ]);

        let mut sampler = Sampler::new(workload, &paths, Duration::from_secs(480));
        // The script runs out after three records and the loop then blocks
        let result = tokio::time::timeout(Duration::from_millis(200), sampler.run()).await;
        assert!(result.is_err());

        let samples = SampleLog::new(&paths.samples).drain().unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1].exit_code(), 124);
        assert_eq!(samples[1].get(Metric::Cpu), 0.0);
        assert_eq!(samples[2].get(Metric::Cpu), 30.0);
    }

    #[tokio::test]
    async fn test_sampler_stops_when_idle() {
        let dir = TempDir::new().unwrap();
        let paths = config_in(&dir).paths();
        let workload = MockWorkload::new(vec![RunOutcome::failed(0), RunOutcome::failed(0)]);

        let mut sampler = Sampler::new(workload, &paths, Duration::ZERO);
        let termination = sampler.run().await.unwrap();

        assert!(matches!(termination, Termination::Idle { runs: 1, .. }));
    }

    #[tokio::test]
    async fn test_daemon_cleans_up_after_idle_exit() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.sampler.idle_timeout_secs = 0;
        let paths = config.paths();

        let workload = MockWorkload::new(vec![RunOutcome::new(0, stress_output(1.0, 2.0, 3.0))]);
        let termination = run_daemon(&config, workload).await.unwrap();

        assert!(matches!(termination, Termination::Idle { .. }));
        for path in paths.transient() {
            assert!(!path.exists(), "{} survived", path.display());
        }
    }

    #[tokio::test]
    async fn test_daemon_defers_to_lock_holder() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let paths = config.paths();

        let _holder = InstanceLock::try_acquire(&paths.lock, Duration::ZERO).unwrap().unwrap();
        let other = std::process::id() + 1;
        Lease::new(other, Utc::now()).save(&paths.handle).unwrap();
        std::fs::write(&paths.samples, "").unwrap();

        let workload = MockWorkload::new(vec![RunOutcome::failed(0)]);
        let runs = workload.clone();
        let termination = run_daemon(&config, workload).await.unwrap();

        assert_eq!(termination, Termination::Superseded);
        assert_eq!(runs.runs(), 0);
        assert_eq!(Lease::load(&paths.handle).unwrap().unwrap().pid, other);
        assert!(paths.samples.exists());
    }

    #[tokio::test]
    async fn test_concurrent_daemons_single_writer() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        let paths = config.paths();

        // Neither script ever finishes, so only a lock refusal ends a daemon
        let first = MockWorkload::new(vec![RunOutcome::failed(0)]);
        let second = MockWorkload::new(vec![RunOutcome::failed(0)]);
        let (first_runs, second_runs) = (first.clone(), second.clone());

        let a = tokio::spawn({
            let config = config.clone();
            async move { run_daemon(&config, first).await }
        });
        let b = tokio::spawn({
            let config = config.clone();
            async move { run_daemon(&config, second).await }
        });

        // The loser gives up once the lock wait runs out
        let mut finished = None;
        for _ in 0..100 {
            if a.is_finished() || b.is_finished() {
                finished = Some(a.is_finished());
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        let a_finished = finished.expect("one daemon must be refused");
        let (loser, winner) = if a_finished { (a, b) } else { (b, a) };

        assert_eq!(loser.await.unwrap().unwrap(), Termination::Superseded);
        assert_eq!(first_runs.runs() + second_runs.runs(), 1);
        assert_eq!(SampleLog::new(&paths.samples).drain().unwrap().len(), 1);

        winner.abort();
        let _ = winner.await;
        assert!(!paths.handle.exists());
    }

    #[tokio::test]
    async fn test_daemon_replaces_stale_lease() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(&dir);
        config.sampler.idle_timeout_secs = 0;
        let paths = config.paths();

        let long_ago = Utc::now() - chrono::Duration::seconds(3600);
        Lease::new(std::process::id() + 1, long_ago).save(&paths.handle).unwrap();

        let workload = MockWorkload::new(vec![RunOutcome::failed(0)]);
        let termination = run_daemon(&config, workload).await.unwrap();

        assert!(matches!(termination, Termination::Idle { runs: 1, .. }));
        assert!(!paths.handle.exists());
    }

    #[tokio::test]
    async fn test_heartbeat_refreshes_lease() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hb.pid");
        let start = Utc::now() - chrono::Duration::seconds(3600);
        let lease = Lease::new(1, start);
        lease.save(&path).unwrap();

        let mut task = HeartbeatTask::spawn(path.clone(), lease, Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(200)).await;
        task.stop().await;

        let refreshed = Lease::load(&path).unwrap().unwrap();
        assert!(refreshed.heartbeat_at > start);
        assert_eq!(refreshed.started_at, start);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_halted_heartbeat_never_rewrites_handle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hb.pid");
        let lease = Lease::new(1, Utc::now());
        lease.save(&path).unwrap();

        let task = HeartbeatTask::spawn(path.clone(), lease, Duration::from_millis(1));
        tokio::time::sleep(Duration::from_millis(30)).await;

        // Same order as the daemon: heartbeat dropped, then cleanup
        drop(task);
        std::fs::remove_file(&path).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert!(!path.exists());
    }
}
