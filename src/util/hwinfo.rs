//! Static hardware identification
//!
//! Two descriptive strings for the `config` output: the processor (model, clock and
//! core count) and the first physical disk (vendor, model and controller). Both are
//! read from procfs/sysfs on Linux and fall back to `unknown` elsewhere.

use std::fs;
use std::path::Path;

const UNKNOWN: &str = "unknown";

/// Hardware descriptions shown on the graphs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardwareInfo {
    pub cpu: String,
    pub disk: String,
}

impl HardwareInfo {
    /// Query the running host
    pub fn collect() -> Self {
        let cpuinfo = fs::read_to_string("/proc/cpuinfo").unwrap_or_default();
        Self {
            cpu: describe_cpu(&cpuinfo, num_cpus::get()),
            disk: describe_disk(Path::new("/sys/block")),
        }
    }
}

/// Model name and clock (MHz) of the first processor in `/proc/cpuinfo`
pub fn parse_cpuinfo(cpuinfo: &str) -> (Option<String>, Option<f64>) {
    let mut model = None;
    let mut mhz = None;

    for line in cpuinfo.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();
        match key.trim() {
            "model name" | "Hardware" if model.is_none() && !value.is_empty() => {
                model = Some(value.to_string());
            }
            "cpu MHz" if mhz.is_none() => mhz = value.parse().ok(),
            _ => {}
        }
        if model.is_some() && mhz.is_some() {
            break;
        }
    }

    (model, mhz)
}

/// `<model> @ <MHz> MHz, <n> cores`, omitting whatever is unknown
pub fn describe_cpu(cpuinfo: &str, cores: usize) -> String {
    let (model, mhz) = parse_cpuinfo(cpuinfo);
    let mut out = model.unwrap_or_else(|| UNKNOWN.to_string());
    if let Some(mhz) = mhz {
        out.push_str(&format!(" @ {:.0} MHz", mhz));
    }
    out.push_str(&format!(", {} cores", cores));
    out
}

fn skip_block_device(name: &str) -> bool {
    ["loop", "ram", "zram", "dm-", "md", "sr", "nbd"]
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

fn read_trimmed(path: &Path) -> Option<String> {
    let text = fs::read_to_string(path).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// Controller family inferred from a block device's resolved sysfs path
pub fn controller_of(device_path: &str) -> &'static str {
    if device_path.contains("/nvme") {
        "NVMe"
    } else if device_path.contains("/usb") {
        "USB"
    } else if device_path.contains("/ata") {
        "SATA"
    } else if device_path.contains("/virtio") {
        "virtio"
    } else if device_path.contains("/host") {
        "SCSI"
    } else {
        UNKNOWN
    }
}

/// `<vendor> <model> (<controller>)` for the first physical disk under `sys_block`
pub fn describe_disk(sys_block: &Path) -> String {
    let Ok(entries) = fs::read_dir(sys_block) else {
        return UNKNOWN.to_string();
    };

    let mut names: Vec<String> = entries
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| !skip_block_device(name))
        .collect();
    names.sort();

    let Some(name) = names.first() else {
        return UNKNOWN.to_string();
    };
    let base = sys_block.join(name);

    let model = read_trimmed(&base.join("device/model")).unwrap_or_else(|| UNKNOWN.to_string());
    let controller = fs::canonicalize(&base)
        .map(|resolved| controller_of(&resolved.to_string_lossy()))
        .unwrap_or(UNKNOWN);

    match read_trimmed(&base.join("device/vendor")) {
        Some(vendor) => format!("{} {} ({})", vendor, model, controller),
        None => format!("{} ({})", model, controller),
    }
}
