//! TOML configuration file parsing

use super::*;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Load the effective configuration
///
/// Without a path the built-in defaults apply. The result is validated either way.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => parse_toml_file(path)?,
        None => Config::default(),
    };

    config.validate().context("Configuration validation failed")?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_toml_empty() {
        let config = parse_toml_string("").unwrap();
        assert_eq!(config.prefix, "stress-ng-munin");
        assert_eq!(config.sampler.idle_timeout_secs, 480);
    }

    #[test]
    fn test_parse_toml_partial() {
        let toml = r#"
state_dir = "/var/lib/stressmon"

[workload]
program = "/usr/local/bin/stress-ng"
timeout_secs = 30

[sampler]
idle_timeout_secs = 600
autostart = true
"#;

        let config = parse_toml_string(toml).unwrap();
        assert_eq!(config.state_dir, PathBuf::from("/var/lib/stressmon"));
        assert_eq!(config.prefix, "stress-ng-munin");
        assert_eq!(config.workload.program, "/usr/local/bin/stress-ng");
        assert_eq!(config.workload.timeout_secs, 30);
        // Unset fields keep their defaults
        assert!(config.workload.args.contains(&"--metrics-brief".to_string()));
        assert_eq!(config.sampler.idle_timeout_secs, 600);
        assert_eq!(config.sampler.heartbeat_interval_secs, 5);
        assert!(config.sampler.autostart);
    }

    #[test]
    fn test_parse_toml_invalid() {
        assert!(parse_toml_string("[sampler]\nidle_timeout_secs = \"soon\"").is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "prefix = \"bench\"\n[logging]\nlevel = \"debug\"").unwrap();

        let config = load_config(Some(file.path())).unwrap();
        assert_eq!(config.prefix, "bench");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_load_config_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[workload]\ntimeout_secs = 0").unwrap();

        assert!(load_config(Some(file.path())).is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        assert!(load_config(Some(Path::new("/nonexistent/stressmon.toml"))).is_err());
    }

    #[test]
    fn test_load_config_defaults() {
        let config = load_config(None).unwrap();
        assert_eq!(config.workload.timeout_secs, 20);
    }
}
