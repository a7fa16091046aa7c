//! stressmon - stress-ng throughput sampler for polling monitoring agents
//!
//! A background daemon runs stress-ng back to back and queues one measurement record
//! per run on disk. Each poll by the monitoring agent drains that queue and reports
//! min/avg/max/stddev per metric for the window since the previous poll. The daemon
//! stops by itself once polling stops.
//!
//! # Architecture
//!
//! - **Parsing**: stress-ng's YAML output into a typed tree, then flattened key/value pairs
//! - **Sampling**: the daemon loop, its lease heartbeat and scoped artifact cleanup
//! - **Handoff**: a locked append/drain sample log plus a poll heartbeat stamp
//! - **Lifecycle**: idempotent start, stop and a lease-based status query
//! - **Reporting**: single-pass aggregation and the munin line protocol

pub mod config;
pub mod daemon;
pub mod lifecycle;
pub mod output;
pub mod parser;
pub mod stats;
pub mod store;
pub mod util;
pub mod workload;

// Re-export commonly used types
pub use config::Config;
pub use lifecycle::DaemonState;
pub use stats::Measurement;

/// Result type used throughout stressmon
pub type Result<T> = anyhow::Result<T>;
