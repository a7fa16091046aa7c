//! Scripted workload for testing
//!
//! Replays a fixed list of [`RunOutcome`]s without starting any process. Once the
//! script is exhausted, [`MockWorkload::run`] never completes, so a sampling loop
//! driven by it appends exactly as many records as were scripted.
//!
//! # Example
//!
//! ```
//! use stressmon::workload::mock::{stress_output, MockWorkload};
//! use stressmon::workload::RunOutcome;
//!
//! let workload = MockWorkload::new(vec![
//!     RunOutcome::new(0, stress_output(10.0, 1.0, 1.0)),
//!     RunOutcome::failed(124),
//! ]);
//! assert_eq!(workload.runs(), 0);
//! ```

use super::{RunOutcome, Workload};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Workload that replays scripted outcomes
#[derive(Debug, Clone)]
pub struct MockWorkload {
    /// Outcomes still to be returned
    script: VecDeque<RunOutcome>,

    /// Completed runs, shared between clones
    runs: Arc<AtomicUsize>,
}

impl MockWorkload {
    pub fn new(outcomes: Vec<RunOutcome>) -> Self {
        Self {
            script: outcomes.into(),
            runs: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of scripted outcomes returned so far
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl Workload for MockWorkload {
    async fn run(&mut self) -> RunOutcome {
        match self.script.pop_front() {
            Some(outcome) => {
                self.runs.fetch_add(1, Ordering::SeqCst);
                outcome
            }
            None => std::future::pending().await,
        }
    }
}

/// Structured output in the shape stress-ng writes with `--yaml`
pub fn stress_output(cpu: f64, memrate: f64, iomix: f64) -> String {
    let mut out = String::from(concat!(
        "---\n",
        "system-info:\n",
        "      stress-ng-version: 0.15.06\n",
        "      run-by: munin\n",
        "metrics:\n",
    ));
    for (stressor, rate) in [("cpu", cpu), ("memrate", memrate), ("iomix", iomix)] {
        out.push_str(&format!(
            concat!(
                "    - stressor: {}\n",
                "      bogo-ops: {}\n",
                "      bogo-ops-per-second-usr-sys-time: {}\n",
                "      bogo-ops-per-second-real-time: {}\n",
                "      wall-clock-time: 10.000000\n",
            ),
            stressor,
            (rate * 10.0).round(),
            rate,
            rate,
        ));
    }
    out.push_str("...\n");
    out
}
