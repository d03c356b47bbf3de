//! Centralized path configuration for telemon.
//!
//! The CLI and tests resolve config locations through here so an override in
//! the environment is honoured everywhere.

use std::path::PathBuf;

/// Environment variable pointing at an explicit config file.
pub const CONFIG_ENV: &str = "TELEMON_CONFIG";

/// Get the telemon config directory.
///
/// Resolution order:
/// 1. `TELEMON_CONFIG_DIR` environment variable
/// 2. Platform config dir (`~/.config/telemon` on Linux)
/// 3. `./.telemon` when no home directory can be determined
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("TELEMON_CONFIG_DIR") {
        return PathBuf::from(dir);
    }

    dirs::config_dir()
        .map(|d| d.join("telemon"))
        .unwrap_or_else(|| PathBuf::from(".telemon"))
}

/// Get the config file path.
pub fn config_file() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    config_dir().join("config.json")
}
