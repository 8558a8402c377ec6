pub mod init;
pub mod library;
pub mod patch;
pub mod write;

use std::path::PathBuf;

use scrivener_config::AppConfig;
use scrivener_store::Library;

pub(crate) fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?)
}

/// Open the library named on the command line, or the configured one.
pub(crate) fn open_library(
    dir: Option<PathBuf>,
    config: &AppConfig,
) -> Result<Library, Box<dyn std::error::Error>> {
    let dir = dir.unwrap_or_else(|| config.library.dir.clone());
    Ok(Library::open(dir).map_err(|e| format!("Failed to open library: {e}"))?)
}
