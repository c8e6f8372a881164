mod cli;
mod logging;
mod probe;

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use dapline_config::validate::validate;
use dapline_config::{load_config, ConfigError};

use crate::cli::CliArgs;

/// Environment variable overriding the global config directory.
const CONFIG_DIR_ENV: &str = "DAPLINE_CONFIG_DIR";

/// Global config directory: `$DAPLINE_CONFIG_DIR`, else `~/.config/dapline`.
fn config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os(CONFIG_DIR_ENV) {
        return Ok(PathBuf::from(dir));
    }
    let home = dirs::home_dir()
        .or_else(|| env::var_os("HOME").map(PathBuf::from))
        .context("could not determine home directory")?;
    Ok(home.join(".config").join("dapline"))
}

fn run(args: CliArgs) -> Result<()> {
    let config_dir = config_dir()?;
    let project_dir = env::current_dir().ok();
    let mut config = load_config(&config_dir, project_dir.as_deref(), args.config.as_deref())
        .context("failed to load config")?;
    args.apply(&mut config);
    validate(&config)
        .map_err(ConfigError::Invalid)
        .context("invalid command-line target")?;

    logging::init(&config.log)?;
    info!("dapline {} starting", env!("CARGO_PKG_VERSION"));

    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(probe::run_probe(&config))
}

fn main() {
    if let Err(e) = run(CliArgs::parse()) {
        eprintln!("dapline: {:#}", e);
        std::process::exit(1);
    }
}
