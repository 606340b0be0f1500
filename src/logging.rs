//! Tracing setup for binaries and tests embedding the driver

use crate::config::Config;
use crate::{Error, Result};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Install a global fmt subscriber.
///
/// `RUST_LOG` wins when set; otherwise `config.log_level` is used.
pub fn init(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| Error::configuration(format!("Invalid log level: {}", e)))?;

    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| Error::internal(format!("Setting default subscriber failed: {}", e)))
}
