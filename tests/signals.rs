//! Signal-driven daemon shutdown
//!
//! Signal handlers are process-wide, so this binary holds a single test: a SIGTERM
//! sent here would reach every daemon running in the same test process.

use std::time::Duration;
use stressmon::config::Config;
use stressmon::daemon::{run_daemon, Termination};
use stressmon::lifecycle::{self, DaemonState};
use stressmon::workload::mock::{stress_output, MockWorkload};
use stressmon::workload::RunOutcome;
use tempfile::TempDir;

#[tokio::test]
async fn test_sigterm_stops_daemon_and_cleans_up() {
    let dir = TempDir::new().unwrap();
    let mut config = Config::default();
    config.state_dir = dir.path().to_path_buf();
    config.prefix = "signals".to_string();
    let paths = config.paths();

    let daemon_config = config.clone();
    let workload = MockWorkload::new(vec![RunOutcome::new(0, stress_output(5.0, 1.0, 1.0))]);
    let daemon = tokio::spawn(async move { run_daemon(&daemon_config, workload).await });

    // The handle is published only once the handlers are in place
    for _ in 0..100 {
        if paths.handle.exists() && paths.samples.exists() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(lifecycle::status(&config), DaemonState::Running);

    let rc = unsafe { libc::kill(libc::getpid(), libc::SIGTERM) };
    assert_eq!(rc, 0);

    let termination = tokio::time::timeout(Duration::from_secs(5), daemon)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(termination, Termination::Signal("SIGTERM"));
    for path in paths.transient() {
        assert!(!path.exists(), "{} survived", path.display());
    }
    assert_eq!(lifecycle::status(&config), DaemonState::Stopped);
}
