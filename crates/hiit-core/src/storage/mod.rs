mod config;

pub use config::{Config, ConfigStore, LogConfig, TimerConfig};

use std::path::PathBuf;

use crate::error::{ConfigError, Result};

/// Environment variable that points the data directory somewhere else.
pub const DATA_DIR_ENV: &str = "HIIT_TIMER_DATA_DIR";

/// Returns `~/.config/hiit-timer[-dev]/` based on HIIT_TIMER_ENV.
///
/// Set HIIT_TIMER_ENV=dev to use the development data directory, or
/// HIIT_TIMER_DATA_DIR to use an explicit one.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os(DATA_DIR_ENV) {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("HIIT_TIMER_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("hiit-timer-dev")
            } else {
                base_dir.join("hiit-timer")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
