//! Configuration commands.

use std::path::Path;

use crate::config::ClientConfig;
use crate::error::ClientResult;

/// Dump the current configuration to stdout.
pub fn dump(config_path: &Path, config: &ClientConfig) -> ClientResult<()> {
    println!("# config.toml ({})", config_path.display());
    println!("{}", config.to_toml()?);
    Ok(())
}

/// Show the configuration and data file paths.
pub fn path(config_path: &Path, config: &ClientConfig) -> ClientResult<()> {
    println!("config: {}", config_path.display());
    println!("session: {}", config.session_store_path().display());
    println!("google: {}", config.google_credentials_path().display());
    Ok(())
}
