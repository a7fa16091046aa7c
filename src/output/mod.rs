//! Report emission
//!
//! The report emitter is the consuming side of the sample log: each poll drains the
//! log, records the poll in the consumer heartbeat, and prints the window's
//! aggregates. A poll never fails from the monitoring agent's point of view; state
//! that cannot be read is logged and reported as an empty window.

pub mod munin;

use crate::config::StatePaths;
use crate::stats::aggregator::{summarize, Report};
use crate::store::{PollStamp, SampleLog};
use chrono::Utc;
use std::io::{self, Write};
use tracing::{debug, error, warn};

/// Consume the current sampling window and write its report to `out`
pub fn emit_report<W: Write>(paths: &StatePaths, out: &mut W) -> io::Result<Report> {
    let samples = SampleLog::new(&paths.samples).drain().unwrap_or_else(|e| {
        error!(error = %e, "cannot drain sample log, reporting an empty window");
        Vec::new()
    });

    if let Err(e) = PollStamp::new(&paths.poll).touch(Utc::now()) {
        warn!(error = %e, "cannot record poll");
    }
    debug!(samples = samples.len(), "emitting report");

    let report = summarize(&samples);
    munin::write_report(&report, out)?;
    Ok(report)
}
