//! Logging setup
//!
//! Events always go to stderr: stdout carries the monitoring agent's line protocol,
//! and the daemon's stderr is redirected to its log file by the launcher.

use crate::Result;
use anyhow::Context;
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber for `level` (an `EnvFilter` directive)
///
/// Installing twice is not an error; the first subscriber stays in place.
pub fn init(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .with_context(|| format!("invalid log level: {}", level))?;

    let _ = fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();

    Ok(())
}
