use std::path::PathBuf;
use std::time::Duration;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

use super::alerts::provider::INFO_DISMISS_AFTER;
use super::error::AppError;

pub const ENV_API_URL: &str = "BENEFIT_API_URL";
pub const ENV_INFO_DISMISS_MS: &str = "BENEFIT_INFO_DISMISS_MS";
pub const ENV_LOG: &str = "BENEFIT_LOG";

/// Application settings.
/// NOTE: TypeScript mirror types live with the front end
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
    /// Base URL of the calculation API. Requests themselves are made by the front end.
    pub api_base_url: String,
    /// How long info alerts stay visible
    #[serde(default = "default_info_dismiss_ms")]
    pub info_dismiss_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_info_dismiss_ms() -> u64 {
    INFO_DISMISS_AFTER.as_millis() as u64
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080/api".to_string(),
            info_dismiss_ms: default_info_dismiss_ms(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    pub fn info_dismiss_after(&self) -> Duration {
        Duration::from_millis(self.info_dismiss_ms)
    }

    /// A zero dismiss delay would clear info alerts on the next tick
    fn sanitized(mut self) -> Self {
        if self.info_dismiss_ms == 0 {
            log::warn!("info_dismiss_ms must be positive, using {}", default_info_dismiss_ms());
            self.info_dismiss_ms = default_info_dismiss_ms();
        }
        self
    }

    /// Apply environment overrides on top of the file settings
    pub fn apply_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            self.api_base_url = url.trim().to_string();
        }
        if let Some(raw) = lookup(ENV_INFO_DISMISS_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => self.info_dismiss_ms = ms,
                _ => log::warn!("Ignoring invalid {}={:?}", ENV_INFO_DISMISS_MS, raw),
            }
        }
        if let Some(level) = lookup(ENV_LOG).filter(|v| !v.trim().is_empty()) {
            self.log_level = level.trim().to_string();
        }
        self
    }
}

pub struct ConfigManager {
    config_path: PathBuf,
}

impl ConfigManager {
    pub fn new(app_config_dir: PathBuf) -> Self {
        Self {
            config_path: app_config_dir.join("settings.json"),
        }
    }

    /// Read `settings.json`. A missing file yields the defaults.
    pub fn try_load(&self) -> Result<Settings, AppError> {
        if !self.config_path.exists() {
            return Ok(Settings::default());
        }
        let content = fs::read_to_string(&self.config_path)?;
        let settings: Settings = serde_json::from_str(&content).map_err(io::Error::from)?;
        Ok(settings.sanitized())
    }

    /// Like `try_load`, but a missing file is written out with the defaults
    /// so there is something to edit.
    pub fn load_or_init(&self) -> Result<Settings, AppError> {
        if self.config_path.exists() {
            return self.try_load();
        }
        let settings = Settings::default();
        self.save(&settings)?;
        Ok(settings)
    }

    pub fn save(&self, settings: &Settings) -> io::Result<()> {
        // Ensure directory exists
        if let Some(parent) = self.config_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        fs::write(&self.config_path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());

        let default = manager.try_load().unwrap();
        assert_eq!(default.info_dismiss_ms, 5000);

        let new_settings = Settings {
            api_base_url: "https://benefits.example.org/api".to_string(),
            info_dismiss_ms: 3000,
            log_level: "debug".to_string(),
        };

        manager.save(&new_settings).unwrap();
        let loaded = manager.try_load().unwrap();

        assert_eq!(loaded, new_settings);
        assert_eq!(loaded.info_dismiss_after(), Duration::from_secs(3));
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("settings.json"),
            r#"{ "api_base_url": "http://api.test" }"#,
        )
        .unwrap();
        let loaded = ConfigManager::new(dir.path().to_path_buf()).try_load().unwrap();
        assert_eq!(loaded.api_base_url, "http://api.test");
        assert_eq!(loaded.info_dismiss_ms, 5000);
        assert_eq!(loaded.log_level, "info");
    }

    #[test]
    fn test_try_load_reports_corrupt_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("settings.json"), "{ not json").unwrap();
        let manager = ConfigManager::new(dir.path().to_path_buf());
        assert!(matches!(manager.try_load(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_zero_dismiss_delay_falls_back_to_default() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("settings.json"),
            r#"{ "api_base_url": "http://api.test", "info_dismiss_ms": 0 }"#,
        )
        .unwrap();
        let loaded = ConfigManager::new(dir.path().to_path_buf()).try_load().unwrap();
        assert_eq!(loaded.info_dismiss_ms, 5000);
        assert_eq!(loaded.api_base_url, "http://api.test");
    }

    #[test]
    fn test_load_or_init_writes_defaults() {
        let dir = tempdir().unwrap();
        let manager = ConfigManager::new(dir.path().join("nested"));
        assert_eq!(manager.load_or_init().unwrap(), Settings::default());
        assert!(dir.path().join("nested/settings.json").exists());
        assert_eq!(manager.try_load().unwrap(), Settings::default());
    }

    #[test]
    fn test_load_or_init_reports_unwritable_dir() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let manager = ConfigManager::new(blocker);
        assert!(matches!(manager.load_or_init(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (ENV_API_URL, "http://override.test"),
            (ENV_INFO_DISMISS_MS, "not-a-number"),
            (ENV_LOG, "trace"),
        ]
        .into_iter()
        .collect();

        let settings = Settings::default().apply_env(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(settings.api_base_url, "http://override.test");
        assert_eq!(settings.info_dismiss_ms, 5000);
        assert_eq!(settings.log_level, "trace");
    }
}
