use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "instruct.config.json";

/// Editing session configuration file format
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionConfig {
    #[serde(default)]
    pub auto_save: AutoSaveConfig,

    #[serde(default)]
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoSaveConfig {
    /// Quiet period after the last edit before saving
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// When false, only explicit saves reach the backend
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_debounce_ms() -> u64 {
    1000
}

fn default_enabled() -> bool {
    true
}

impl AutoSaveConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            enabled: default_enabled(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryConfig {
    /// Undo levels kept (0 = unlimited)
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

fn default_capacity() -> usize {
    instruct_editor::DEFAULT_HISTORY_CAPACITY
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl SessionConfig {
    /// Load config from a directory
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let config_path = dir.join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: SessionConfig = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            // Return default config if none exists
            Ok(SessionConfig::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "autoSave": { "debounceMs": 250, "enabled": false },
            "history": { "capacity": 50 }
        }"#;

        let config: SessionConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.auto_save.debounce(), Duration::from_millis(250));
        assert!(!config.auto_save.enabled);
        assert_eq!(config.history.capacity, 50);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{ "autoSave": {} }"#).unwrap();
        assert_eq!(config, SessionConfig::default());
        assert_eq!(config.auto_save.debounce_ms, 1000);
        assert_eq!(config.history.capacity, 20);
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(SessionConfig::load(dir.path()).unwrap(), SessionConfig::default());

        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_NAME),
            r#"{ "autoSave": { "debounceMs": 500 } }"#,
        )
        .unwrap();
        let config = SessionConfig::load(dir.path()).unwrap();
        assert_eq!(config.auto_save.debounce_ms, 500);
        assert!(config.auto_save.enabled);
    }

    #[test]
    fn test_invalid_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_NAME), "{ not json").unwrap();
        assert!(SessionConfig::load(dir.path()).is_err());
    }
}
