//! Configuration validation

use super::*;
use anyhow::Result;

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.prefix.trim().is_empty() {
        anyhow::bail!("prefix must not be empty");
    }
    if config.prefix.contains('/') {
        anyhow::bail!("prefix must not contain '/', got {:?}", config.prefix);
    }

    validate_workload(&config.workload)?;
    validate_sampler(&config.sampler)?;

    Ok(())
}

/// Validate workload configuration
pub fn validate_workload(workload: &WorkloadConfig) -> Result<()> {
    if workload.program.trim().is_empty() {
        anyhow::bail!("workload.program must not be empty");
    }

    if workload.timeout_secs == 0 {
        anyhow::bail!("workload.timeout_secs must be greater than 0");
    }

    Ok(())
}

/// Validate sampler timing
pub fn validate_sampler(sampler: &SamplerConfig) -> Result<()> {
    if sampler.heartbeat_interval_secs == 0 {
        anyhow::bail!("sampler.heartbeat_interval_secs must be greater than 0");
    }

    // A lease that expires between two heartbeats would flap to Quit
    if sampler.lease_ttl_secs <= sampler.heartbeat_interval_secs {
        anyhow::bail!(
            "sampler.lease_ttl_secs ({}) must exceed sampler.heartbeat_interval_secs ({})",
            sampler.lease_ttl_secs,
            sampler.heartbeat_interval_secs
        );
    }

    Ok(())
}
