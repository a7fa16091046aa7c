//! stressmon CLI entry point

use anyhow::{Context, Result};
use std::io::Write;
use stressmon::config::cli::{Cli, Command};
use stressmon::config::toml::load_config;
use stressmon::config::Config;
use stressmon::daemon::run_daemon;
use stressmon::lifecycle::{self, LifecycleError};
use stressmon::output::{self, munin};
use stressmon::util::{hwinfo::HardwareInfo, logging};
use stressmon::workload::{locate, StressNg};

fn main() {
    let cli = Cli::parse_args();

    if let Err(e) = run(&cli) {
        match e.downcast_ref::<LifecycleError>() {
            Some(LifecycleError::NotRunning) => eprintln!("{}", e),
            _ => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    logging::init(&config.logging.level)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        None => {
            output::emit_report(&config.paths(), &mut out).context("Failed to write report")?;
            out.flush()?;
            if config.sampler.autostart {
                // Polling must keep working even if the daemon cannot be launched
                if let Err(e) = start(cli, &config) {
                    tracing::warn!(error = %e, "autostart failed");
                }
            }
        }
        Some(Command::Config) => {
            munin::write_config(&HardwareInfo::collect(), &mut out)?;
        }
        Some(Command::Suggest) => {
            writeln!(out, "{}", munin::SUGGEST)?;
        }
        Some(Command::Autoconf) => {
            let program = &config.workload.program;
            munin::write_autoconf(program, locate(program).is_some(), &mut out)?;
        }
        Some(Command::Start) => start(cli, &config)?,
        Some(Command::Stop) => {
            lifecycle::stop(&config)?;
        }
        Some(Command::Status) => {
            writeln!(out, "stress-ng {}", lifecycle::status(&config))?;
        }
        Some(Command::Run) => {
            let runtime = tokio::runtime::Runtime::new()
                .context("Failed to create tokio runtime")?;
            runtime.block_on(run_daemon(&config, StressNg::from_config(&config)))?;
        }
    }

    Ok(())
}

fn start(cli: &Cli, config: &Config) -> Result<()> {
    lifecycle::start(config, || {
        lifecycle::launch_detached(config, cli.config.as_deref())
    })?;
    Ok(())
}
