//! Workload generator invocation
//!
//! The workload is an opaque external program run with a fixed command line. Each run
//! yields a [`RunOutcome`]: the exit status plus the structured output it left behind,
//! if any. Failures never surface as errors here; a run that could not be spawned,
//! timed out or left no output still produces an outcome, and therefore a record.

pub mod mock;

use crate::config::Config;
use crate::parser::{self, flatten};
use crate::stats::Measurement;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

/// Exit status recorded when the per-run timeout fires
pub const TIMEOUT_EXIT: i32 = 124;

/// Exit status recorded when the program cannot be started
pub const SPAWN_FAILED_EXIT: i32 = 127;

/// Result of one workload run
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub exit_code: i32,
    /// Structured output, `None` when the run produced nothing readable
    pub output: Option<String>,
}

impl RunOutcome {
    pub fn new(exit_code: i32, output: impl Into<String>) -> Self {
        Self {
            exit_code,
            output: Some(output.into()),
        }
    }

    /// Outcome of a run that left no output
    pub fn failed(exit_code: i32) -> Self {
        Self {
            exit_code,
            output: None,
        }
    }

    /// Reduce this run to a measurement record
    ///
    /// Missing or unparseable output yields zero throughputs; the exit status is
    /// always kept.
    pub fn measurement(&self) -> Measurement {
        let Some(output) = &self.output else {
            return Measurement::failed(self.exit_code);
        };

        match parser::parse_document(output) {
            Ok(tree) => Measurement::from_pairs(&flatten(&tree), self.exit_code),
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    exit_code = self.exit_code,
                    "unparseable workload output"
                );
                Measurement::failed(self.exit_code)
            }
        }
    }
}

/// A runnable workload
pub trait Workload {
    /// Run once and report what happened
    fn run(&mut self) -> impl Future<Output = RunOutcome> + Send;
}

/// stress-ng invoked with a fixed command line and a wall-clock bound
#[derive(Debug, Clone)]
pub struct StressNg {
    program: String,
    args: Vec<String>,
    artifact: PathBuf,
    timeout: Duration,
}

impl StressNg {
    pub fn new(
        program: impl Into<String>,
        args: Vec<String>,
        artifact: PathBuf,
        timeout: Duration,
    ) -> Self {
        Self {
            program: program.into(),
            args,
            artifact,
            timeout,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.workload.program.clone(),
            config.workload.args.clone(),
            config.paths().artifact,
            config.workload.timeout(),
        )
    }

    /// Full argument list, including the output artifact
    pub fn command_args(&self) -> Vec<String> {
        let mut args = self.args.clone();
        args.push("--yaml".to_string());
        args.push(self.artifact.display().to_string());
        args
    }
}

impl Workload for StressNg {
    async fn run(&mut self) -> RunOutcome {
        // A leftover artifact must not be mistaken for this run's output
        let _ = tokio::fs::remove_file(&self.artifact).await;

        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(self.command_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .process_group(0)
            .kill_on_drop(true);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                tracing::warn!(program = %self.program, error = %e, "failed to start workload");
                return RunOutcome::failed(SPAWN_FAILED_EXIT);
            }
        };

        let exit_code = match tokio::time::timeout(self.timeout, child.wait()).await {
            Ok(Ok(status)) => exit_code_of(status),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "failed to wait for workload");
                let _ = child.kill().await;
                return RunOutcome::failed(1);
            }
            Err(_) => {
                tracing::warn!(timeout_secs = self.timeout.as_secs(), "workload timed out");
                // stress-ng forks its stressors into the same group
                if let Some(pid) = child.id() {
                    unsafe {
                        libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
                    }
                }
                let _ = child.kill().await;
                return RunOutcome::failed(TIMEOUT_EXIT);
            }
        };

        let output = match tokio::fs::read_to_string(&self.artifact).await {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!(error = %e, exit_code, "workload left no output");
                None
            }
        };

        RunOutcome { exit_code, output }
    }
}

/// Shell-style exit status: the code, or 128 + signal number
pub fn exit_code_of(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;

    match (status.code(), status.signal()) {
        (Some(code), _) => code,
        (None, Some(signal)) => 128 + signal,
        (None, None) => 1,
    }
}

/// Locate `program` the way a shell would
pub fn locate(program: &str) -> Option<PathBuf> {
    let is_executable = |path: &Path| {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    };

    if program.contains('/') {
        let path = PathBuf::from(program);
        return is_executable(path.as_path()).then_some(path);
    }

    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable(candidate.as_path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Metric;

    #[test]
    fn test_measurement_from_output() {
        let outcome = RunOutcome::new(0, mock::stress_output(61.7, 2.5, 1500.0));
        let record = outcome.measurement();

        assert_eq!(record.get(Metric::Cpu), 61.7);
        assert_eq!(record.get(Metric::Memrate), 2.5);
        assert_eq!(record.get(Metric::Iomix), 1500.0);
        assert_eq!(record.exit_code(), 0);
    }

    #[test]
    fn test_measurement_without_output() {
        let record = RunOutcome::failed(TIMEOUT_EXIT).measurement();
        assert_eq!(record.values(), &[0.0, 0.0, 0.0, 124.0]);
    }

    #[test]
    fn test_measurement_from_garbage() {
        let record = RunOutcome::new(2, "metrics:\n  - stressor: cpu\n garbage\n").measurement();
        assert_eq!(record.values(), &[0.0, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn test_command_args_append_artifact() {
        let workload = StressNg::new(
            "stress-ng",
            vec!["--cpu".to_string(), "1".to_string()],
            PathBuf::from("/tmp/x.yaml"),
            Duration::from_secs(20),
        );

        assert_eq!(workload.command_args(), vec!["--cpu", "1", "--yaml", "/tmp/x.yaml"]);
    }

    #[test]
    fn test_exit_code_of() {
        use std::os::unix::process::ExitStatusExt;

        assert_eq!(exit_code_of(ExitStatus::from_raw(0)), 0);
        assert_eq!(exit_code_of(ExitStatus::from_raw(3 << 8)), 3);
        // Killed by SIGKILL
        assert_eq!(exit_code_of(ExitStatus::from_raw(9)), 137);
    }

    #[test]
    fn test_locate() {
        assert!(locate("sh").is_some());
        assert!(locate("/bin/sh").is_some());
        assert!(locate("definitely-not-a-real-program-xyz").is_none());
    }

    #[tokio::test]
    async fn test_run_missing_program() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut workload = StressNg::new(
            "definitely-not-a-real-program-xyz",
            vec![],
            dir.path().join("out.yaml"),
            Duration::from_secs(5),
        );

        assert_eq!(workload.run().await, RunOutcome::failed(SPAWN_FAILED_EXIT));
    }

    #[tokio::test]
    async fn test_run_times_out() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut workload = StressNg::new(
            "sh",
            vec!["-c".to_string(), "sleep 5".to_string(), "sh".to_string()],
            dir.path().join("out.yaml"),
            Duration::from_millis(200),
        );

        assert_eq!(workload.run().await, RunOutcome::failed(TIMEOUT_EXIT));
    }

    #[tokio::test]
    async fn test_run_reads_artifact() {
        let dir = tempfile::TempDir::new().unwrap();
        let artifact = dir.path().join("out.yaml");
        // `--yaml <path>` lands in $1 and $2
        let script = concat!(
            "printf 'metrics:\\n    - stressor: cpu\\n",
            "      bogo-ops-per-second-real-time: 12.5\\n' > \"$2\"",
        );
        let mut workload = StressNg::new(
            "sh",
            vec!["-c".to_string(), script.to_string(), "sh".to_string()],
            artifact,
            Duration::from_secs(5),
        );

        let outcome = workload.run().await;
        assert_eq!(outcome.exit_code, 0);
        assert_eq!(outcome.measurement().get(Metric::Cpu), 12.5);
    }
}
