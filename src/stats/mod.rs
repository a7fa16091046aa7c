//! Measurement records
//!
//! A [`Measurement`] is one workload run reduced to four numbers in a fixed order:
//! cpu, memrate and iomix throughput (bogo-ops/s, real time) followed by the run's
//! exit status. The order is shared by the sample log, the aggregator and the report,
//! and everything downstream of parsing indexes by position through [`Metric`].

pub mod aggregator;

use serde::{Deserialize, Serialize};

/// Metric fields in pipeline order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Cpu,
    Memrate,
    Iomix,
    ExitCode,
}

impl Metric {
    /// All metrics in record order
    pub const ALL: [Metric; 4] = [Metric::Cpu, Metric::Memrate, Metric::Iomix, Metric::ExitCode];

    /// Position of this metric in a record
    pub fn index(self) -> usize {
        match self {
            Metric::Cpu => 0,
            Metric::Memrate => 1,
            Metric::Iomix => 2,
            Metric::ExitCode => 3,
        }
    }

    /// Short name used for graph and field names
    pub fn name(self) -> &'static str {
        match self {
            Metric::Cpu => "cpu",
            Metric::Memrate => "memrate",
            Metric::Iomix => "iomix",
            Metric::ExitCode => "exit_code",
        }
    }

    /// Flattened workload key holding this metric's throughput
    pub fn source_key(self) -> Option<&'static str> {
        match self {
            Metric::Cpu => Some("metrics_cpu_bogo_ops_per_second_real_time"),
            Metric::Memrate => Some("metrics_memrate_bogo_ops_per_second_real_time"),
            Metric::Iomix => Some("metrics_iomix_bogo_ops_per_second_real_time"),
            Metric::ExitCode => None,
        }
    }

    /// Standard deviation of an exit status says nothing useful
    pub fn reports_stddev(self) -> bool {
        self != Metric::ExitCode
    }
}

/// One workload run: three throughputs and the exit status
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Measurement {
    values: [f64; 4],
}

impl Measurement {
    pub fn new(cpu: f64, memrate: f64, iomix: f64, exit_code: i32) -> Self {
        Self {
            values: [cpu, memrate, iomix, exit_code as f64],
        }
    }

    /// Record for a run that produced no usable output
    pub fn failed(exit_code: i32) -> Self {
        Self::new(0.0, 0.0, 0.0, exit_code)
    }

    /// Build a record from flattened `key = value` pairs
    ///
    /// Missing or non-numeric throughput keys read as zero. The exit status is
    /// captured separately from the output and always stored.
    pub fn from_pairs(pairs: &[(String, String)], exit_code: i32) -> Self {
        let mut record = Self::failed(exit_code);

        for metric in Metric::ALL {
            let Some(source) = metric.source_key() else {
                continue;
            };

            record.values[metric.index()] = pairs
                .iter()
                .find(|(key, _)| key == source)
                .and_then(|(_, value)| value.trim().parse::<f64>().ok())
                .filter(|value| value.is_finite())
                .unwrap_or(0.0);
        }

        record
    }

    pub fn get(&self, metric: Metric) -> f64 {
        self.values[metric.index()]
    }

    pub fn values(&self) -> &[f64; 4] {
        &self.values
    }

    pub fn exit_code(&self) -> i32 {
        self.values[Metric::ExitCode.index()] as i32
    }
}
