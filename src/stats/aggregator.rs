//! Statistics aggregation
//!
//! Reduces a sampling window of [`Measurement`]s to one [`Summary`] per metric in a
//! single pass, keeping running count, sum, sum of squares, minimum and maximum per
//! column.
//!
//! The standard deviation is the population form computed from the running sums,
//! `sqrt((sumsq - sum²/n) / n)`, not the two-pass form. Existing graphs compare
//! against values produced by exactly this formula.
//!
//! # Example
//!
//! ```
//! use stressmon::stats::{Measurement, Metric};
//! use stressmon::stats::aggregator::StatAggregator;
//!
//! let mut aggregator = StatAggregator::new();
//! aggregator.add(&Measurement::new(10.0, 1.0, 1.0, 0));
//! aggregator.add(&Measurement::new(30.0, 1.0, 1.0, 0));
//!
//! let report = aggregator.finish();
//! assert_eq!(report.get(Metric::Cpu).avg, 20.0);
//! assert_eq!(report.get(Metric::Cpu).stddev, 10.0);
//! ```

use crate::stats::{Measurement, Metric};

/// min/avg/max/stddev of one metric over a window
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Summary {
    pub min: f64,
    pub avg: f64,
    pub max: f64,
    pub stddev: f64,
}

/// One [`Summary`] per metric, in [`Metric::ALL`] order
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Report {
    summaries: [Summary; 4],
}

impl Report {
    pub fn get(&self, metric: Metric) -> Summary {
        self.summaries[metric.index()]
    }

    /// Summaries paired with their metric, in record order
    pub fn iter(&self) -> impl Iterator<Item = (Metric, Summary)> + '_ {
        Metric::ALL.into_iter().map(move |metric| (metric, self.get(metric)))
    }
}

/// Running accumulator for one column
#[derive(Debug, Clone, Copy)]
struct Column {
    sum: f64,
    sumsq: f64,
    min: f64,
    max: f64,
}

impl Column {
    fn new() -> Self {
        Self {
            sum: 0.0,
            sumsq: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    fn add(&mut self, value: f64) {
        self.sum += value;
        self.sumsq += value * value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn summary(&self, count: usize) -> Summary {
        let n = count as f64;
        // Rounding can leave a hair below zero for constant columns
        let variance = ((self.sumsq - self.sum * self.sum / n) / n).max(0.0);

        Summary {
            min: self.min,
            avg: self.sum / n,
            max: self.max,
            stddev: variance.sqrt(),
        }
    }
}

/// Single-pass aggregator over a sampling window
///
/// # Usage
///
/// 1. Create aggregator with `new()`
/// 2. Feed records with `add()` (or build one with `from_samples()`)
/// 3. Get the per-metric summaries with `finish()`
#[derive(Debug, Clone)]
pub struct StatAggregator {
    columns: [Column; 4],
    count: usize,
}

impl StatAggregator {
    /// Create an empty aggregator
    pub fn new() -> Self {
        Self {
            columns: [Column::new(); 4],
            count: 0,
        }
    }

    /// Aggregator already fed with every record of a window
    pub fn from_samples(samples: &[Measurement]) -> Self {
        let mut aggregator = Self::new();
        for sample in samples {
            aggregator.add(sample);
        }
        aggregator
    }

    /// Add one record
    pub fn add(&mut self, sample: &Measurement) {
        for (column, &value) in self.columns.iter_mut().zip(sample.values()) {
            column.add(value);
        }
        self.count += 1;
    }

    /// Number of records added so far
    pub fn count(&self) -> usize {
        self.count
    }

    /// Compute the per-metric summaries
    ///
    /// An empty window is treated as a single all-zero record, so every metric still
    /// reports a full `{0, 0, 0, 0}` summary instead of failing.
    pub fn finish(&self) -> Report {
        let mut working = self.clone();
        if working.count == 0 {
            working.add(&Measurement::default());
        }

        let mut summaries = [Summary::default(); 4];
        for (summary, column) in summaries.iter_mut().zip(working.columns.iter()) {
            *summary = column.summary(working.count);
        }

        Report { summaries }
    }
}

impl Default for StatAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Aggregate a whole window at once
pub fn summarize(samples: &[Measurement]) -> Report {
    StatAggregator::from_samples(samples).finish()
}
