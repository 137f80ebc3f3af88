use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use travelink_cli::{logging::init_logging, Cli};
use travelink_core::config::AppConfig;

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Commands report config failures themselves; logging just stays off.
    if let Ok(config) = AppConfig::load(cli.load_options()) {
        init_logging(&config.logging)?;
    }

    Ok(travelink_cli::run(cli))
}
