//! TOML-based application configuration.
//!
//! Stores user preferences including:
//! - Workout shape (work/rest durations, set count)
//! - Timer tick cadence
//! - Log level
//!
//! Configuration is stored at `~/.config/hiit-timer/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::error::{ConfigError, Result};
use crate::timer::DEFAULT_PERIOD;
use crate::workout::{PreferenceStore, WorkoutSettings};

/// Timer configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Tick cadence in milliseconds.
    #[serde(default = "default_period_ms")]
    pub period_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter directive used when RUST_LOG is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/hiit-timer/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub workout: WorkoutSettings,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

fn default_period_ms() -> u64 {
    DEFAULT_PERIOD.as_millis() as u64
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            period_ms: default_period_ms(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let unknown = || ConfigError::UnknownKey(key.to_string());
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(unknown());
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_some() {
                current = current.get_mut(part).ok_or_else(unknown)?;
                continue;
            }

            let obj = current.as_object_mut().ok_or_else(unknown)?;
            let existing = obj.get(part).ok_or_else(unknown)?;
            let new_value = match existing {
                serde_json::Value::Bool(_) => serde_json::Value::Bool(
                    value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                ),
                serde_json::Value::Number(_) => value
                    .parse::<u64>()
                    .map(|n| serde_json::Value::Number(n.into()))
                    .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?,
                serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
                    return Err(invalid("cannot overwrite a whole table".into()));
                }
                _ => serde_json::Value::String(value.into()),
            };
            obj.insert(part.to_string(), new_value);
            return Ok(());
        }

        Err(unknown())
    }

    /// Default location of the config file.
    pub fn path() -> Result<PathBuf> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the default location, writing defaults if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::path()?)
    }

    /// Load from `path`, writing defaults there if the file does not exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let cfg: Config = toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })?;
                cfg.validate()?;
                Ok(cfg)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
            .into()),
        }
    }

    /// Load from disk, returning default on error.
    /// This is a convenience method that never fails.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "using default configuration");
            Self::default()
        })
    }

    /// Persist to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))?;
        Ok(())
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by dot-separated key. The new value must have the
    /// same type as the old one and leave the config valid. Not persisted.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let mut json = serde_json::to_value(&*self)?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.validate()?;
        *self = updated;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.workout.validate()?;
        if self.timer.period_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "timer.period_ms".into(),
                message: "must be greater than zero".into(),
            }
            .into());
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.timer.period_ms)
    }
}

/// [`PreferenceStore`] backed by the `[workout]` table of a config file.
///
/// Other tables in the file are preserved on every write.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default config location.
    pub fn open() -> Result<Self> {
        Ok(Self::new(Config::path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for ConfigStore {
    fn load_settings(&self) -> Option<WorkoutSettings> {
        match Config::load_from(&self.path) {
            Ok(cfg) => Some(cfg.workout),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot read preferences");
                None
            }
        }
    }

    fn save_settings(&self, settings: &WorkoutSettings) -> Result<()> {
        let mut cfg = Config::load_from(&self.path)?;
        cfg.workout = *settings;
        cfg.validate()?;
        cfg.save_to(&self.path)?;
        tracing::debug!(path = %self.path.display(), "saved workout preferences");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.workout, WorkoutSettings::default());
        assert_eq!(parsed.timer.period_ms, 100);
        assert_eq!(parsed.log.level, "info");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("workout.sets").as_deref(), Some("8"));
        assert_eq!(cfg.get("log.level").as_deref(), Some("info"));
        assert!(cfg.get("workout.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_nested_number() {
        let mut cfg = Config::default();
        cfg.set("workout.rest_secs", "15").unwrap();
        assert_eq!(cfg.workout.rest_secs, 15);
    }

    #[test]
    fn set_updates_nested_string() {
        let mut cfg = Config::default();
        cfg.set("log.level", "debug").unwrap();
        assert_eq!(cfg.log.level, "debug");
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        let err = cfg.set("workout.nonexistent_key", "1").unwrap_err();
        assert!(matches!(err, CoreError::Config(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(cfg.set("workout.sets", "lots").is_err());
        assert!(cfg.set("workout", "{}").is_err());
        assert_eq!(cfg.workout.sets, 8);
    }

    #[test]
    fn set_rejects_invalid_workout() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("workout.sets", "0"),
            Err(CoreError::Validation(_))
        ));
        assert!(cfg.set("timer.period_ms", "0").is_err());
        assert_eq!(cfg.timer.period_ms, 100);
    }

    #[test]
    fn missing_sections_take_defaults() {
        let cfg: Config = toml::from_str("[workout]\nwork_secs = 40\n").unwrap();
        assert_eq!(cfg.workout.work_secs, 40);
        assert_eq!(cfg.workout.rest_secs, 10);
        assert_eq!(cfg.period(), DEFAULT_PERIOD);
    }

    #[test]
    fn load_from_writes_defaults_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg.workout, WorkoutSettings::default());
        assert!(path.exists());
    }

    #[test]
    fn load_from_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "workout = 3").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn config_store_preserves_other_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut cfg = Config::default();
        cfg.log.level = "trace".into();
        cfg.save_to(&path).unwrap();

        let store = ConfigStore::new(&path);
        let settings = WorkoutSettings::new(30, 15, 5).unwrap();
        store.save_settings(&settings).unwrap();

        assert_eq!(store.load_settings(), Some(settings));
        assert_eq!(Config::load_from(&path).unwrap().log.level, "trace");
    }
}
