use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;
use travelink_core::config::{LogFormat, LoggingConfig};

/// Installs the global subscriber. Logs go to stderr so command output on
/// stdout stays machine-readable.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level)
        .map_err(|error| anyhow!("invalid log level `{}`: {error}", config.level))?;
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|error| anyhow!("could not install log subscriber: {error}"))
}
