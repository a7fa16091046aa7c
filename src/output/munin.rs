//! Munin plugin line protocol
//!
//! Every metric gets its own multigraph section named `stress_ng_<metric>`. Fields
//! inside a section are `<metric>_<statistic>`, in the order min, avg, max, stddev.

use crate::stats::aggregator::{Report, Summary};
use crate::stats::Metric;
use crate::util::hwinfo::HardwareInfo;
use std::io::{self, Write};

/// Installation hint printed by `suggest`
pub const SUGGEST: &str = "ln -s /usr/local/bin/stressmon /etc/munin/plugins/stress_ng";

const CATEGORY: &str = "stress";

/// Statistics emitted for `metric`, in output order
fn statistics(metric: Metric) -> &'static [&'static str] {
    if metric.reports_stddev() {
        &["min", "avg", "max", "stddev"]
    } else {
        &["min", "avg", "max"]
    }
}

fn value_of(summary: &Summary, statistic: &str) -> f64 {
    match statistic {
        "min" => summary.min,
        "avg" => summary.avg,
        "max" => summary.max,
        _ => summary.stddev,
    }
}

fn graph_title(metric: Metric) -> &'static str {
    match metric {
        Metric::Cpu => "stress-ng cpu throughput",
        Metric::Memrate => "stress-ng memory rate throughput",
        Metric::Iomix => "stress-ng mixed I/O throughput",
        Metric::ExitCode => "stress-ng exit status",
    }
}

fn graph_vlabel(metric: Metric) -> &'static str {
    match metric {
        Metric::ExitCode => "exit code",
        _ => "bogo ops/s",
    }
}

/// Write the aggregate report for one sampling window
pub fn write_report<W: Write>(report: &Report, out: &mut W) -> io::Result<()> {
    for (metric, summary) in report.iter() {
        writeln!(out, "multigraph stress_ng_{}", metric.name())?;
        for statistic in statistics(metric) {
            writeln!(
                out,
                "{}_{}.value {:.6}",
                metric.name(),
                statistic,
                value_of(&summary, statistic)
            )?;
        }
    }
    Ok(())
}

/// Write graph and field definitions
///
/// The cpu graph carries the processor description and the iomix graph the disk
/// description as `graph_info`.
pub fn write_config<W: Write>(hardware: &HardwareInfo, out: &mut W) -> io::Result<()> {
    for metric in Metric::ALL {
        let name = metric.name();
        writeln!(out, "multigraph stress_ng_{}", name)?;
        writeln!(out, "graph_title {}", graph_title(metric))?;
        writeln!(out, "graph_args --base 1000 -l 0")?;
        writeln!(out, "graph_vlabel {}", graph_vlabel(metric))?;
        writeln!(out, "graph_category {}", CATEGORY)?;
        match metric {
            Metric::Cpu => writeln!(out, "graph_info {}", hardware.cpu)?,
            Metric::Iomix => writeln!(out, "graph_info {}", hardware.disk)?,
            _ => {}
        }
        for statistic in statistics(metric) {
            writeln!(out, "{}_{}.label {} {}", name, statistic, name, statistic)?;
            writeln!(out, "{}_{}.type GAUGE", name, statistic)?;
        }
    }
    Ok(())
}

/// Answer `autoconf`: whether the workload program can be run here
pub fn write_autoconf<W: Write>(program: &str, available: bool, out: &mut W) -> io::Result<()> {
    if available {
        writeln!(out, "yes")
    } else {
        writeln!(out, "no ({} not found)", program)
    }
}
