//! Artifact cleanup on daemon exit

use crate::config::StatePaths;
use crate::store::remove_if_exists;

/// Remove every transient artifact, returning how many existed
///
/// Failures are logged and skipped so one stuck file does not keep the others around.
pub fn remove_artifacts(paths: &StatePaths) -> usize {
    let mut removed = 0;
    for path in paths.transient() {
        match remove_if_exists(path) {
            Ok(true) => removed += 1,
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "cleanup failed"),
        }
    }
    removed
}

/// Scoped guard that clears the daemon's artifacts when dropped
///
/// Held for the lifetime of the sampling loop so the handle, sample log, output
/// artifact and poll stamp disappear on every exit path that unwinds: normal return,
/// error propagation, panic, or a handled termination signal.
pub struct CleanupGuard {
    paths: StatePaths,
}

impl CleanupGuard {
    pub fn new(paths: &StatePaths) -> Self {
        Self {
            paths: paths.clone(),
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        let removed = remove_artifacts(&self.paths);
        tracing::debug!(removed, "removed daemon artifacts");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn populate(paths: &StatePaths) {
        for path in paths.transient() {
            fs::write(path, "x").unwrap();
        }
        fs::write(&paths.daemon_log, "log").unwrap();
    }

    #[test]
    fn test_guard_removes_on_drop() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::new(dir.path(), "t");
        populate(&paths);

        {
            let _guard = CleanupGuard::new(&paths);
            assert!(paths.handle.exists());
        }

        for path in paths.transient() {
            assert!(!path.exists(), "{} survived", path.display());
        }
        assert!(paths.daemon_log.exists());
    }

    #[test]
    fn test_guard_removes_on_panic() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::new(dir.path(), "t");
        populate(&paths);

        let inner = paths.clone();
        let result = std::panic::catch_unwind(move || {
            let _guard = CleanupGuard::new(&inner);
            panic!("sampler crashed");
        });

        assert!(result.is_err());
        assert!(!paths.samples.exists());
    }

    #[test]
    fn test_remove_artifacts_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let paths = StatePaths::new(dir.path(), "t");
        populate(&paths);

        assert_eq!(remove_artifacts(&paths), 4);
        assert_eq!(remove_artifacts(&paths), 0);
        assert!(!Path::new(&paths.poll).exists());
    }
}
