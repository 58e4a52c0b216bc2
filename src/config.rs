use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

fn default_interval_secs() -> u64 {
    30
}

fn default_max_retries() -> u32 {
    crate::sync::MAX_RETRIES
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_probe_interval_secs() -> u64 {
    10
}

/// Sync configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Server base URL (e.g. "https://fit.example.com/api")
    pub server_url: Option<String>,
    /// Bearer token sent with every request; never written back out
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Seconds between timer-triggered passes
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Failed replays allowed before an operation is dead-lettered
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Seconds between health checks while watching
    #[serde(default = "default_probe_interval_secs")]
    pub probe_interval_secs: u64,
    /// Start a pass right after each local write when online (default: true)
    #[serde(default = "default_auto_sync")]
    pub auto_sync: bool,
}

fn default_auto_sync() -> bool {
    true
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            api_key: None,
            interval_secs: default_interval_secs(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
            probe_interval_secs: default_probe_interval_secs(),
            auto_sync: default_auto_sync(),
        }
    }
}

impl SyncConfig {
    /// Returns true if a server URL is set
    pub fn is_configured(&self) -> bool {
        self.server_url.is_some()
    }

    /// Rejects zero durations, which would stop the timer or spin the probe.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let durations = [
            ("sync.interval_secs", self.interval_secs),
            ("sync.request_timeout_secs", self.request_timeout_secs),
            ("sync.probe_interval_secs", self.probe_interval_secs),
        ];
        for (key, secs) in durations {
            if secs == 0 {
                return Err(ConfigError::ZeroDuration { key });
            }
        }
        Ok(())
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.probe_interval_secs)
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Path to the SQLite database
    pub database_path: ConfigValue<PathBuf>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
    /// Sync configuration
    pub sync: SyncConfig,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    database_path: Option<PathBuf>,
    sync: Option<SyncConfig>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut database_path = ConfigValue::new(
            Self::default_data_dir().join("fit-sync.db"),
            ConfigSource::Default,
        );
        let mut config_file = None;
        let mut sync = SyncConfig::default();

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
                path: path.clone(),
                source,
            })?;
            let file_config: ConfigFile =
                serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                    path: path.clone(),
                    source,
                })?;

            config_file = Some(path.clone());

            if let Some(db_path) = file_config.database_path {
                // Relative paths are relative to the config file
                let resolved_path = if db_path.is_relative() {
                    path.parent().map(|p| p.join(&db_path)).unwrap_or(db_path)
                } else {
                    db_path
                };
                database_path = ConfigValue::new(resolved_path, ConfigSource::File);
            }
            if let Some(sync_config) = file_config.sync {
                sync = sync_config;
            }
        }

        if let Ok(db_path) = std::env::var("FIT_DATABASE_PATH") {
            database_path = ConfigValue::new(PathBuf::from(db_path), ConfigSource::Environment);
        }
        if let Ok(url) = std::env::var("FIT_SYNC_URL") {
            sync.server_url = Some(url);
        }
        if let Ok(key) = std::env::var("FIT_SYNC_API_KEY") {
            sync.api_key = Some(key);
        }
        if let Ok(interval) = std::env::var("FIT_SYNC_INTERVAL") {
            sync.interval_secs = interval.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                name: "FIT_SYNC_INTERVAL",
                value: interval.clone(),
            })?;
        }

        sync.validate()?;

        Ok(Self {
            database_path,
            config_file,
            sync,
        })
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/fit/
    /// - macOS: ~/Library/Application Support/fit/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fit")
    }

    /// Default data directory, e.g. ~/.local/share/fit/ on Linux
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("fit")
    }

    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid value '{value}' for {name}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("{key} must be at least 1 second")]
    ZeroDuration { key: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert!(config
            .database_path
            .value
            .to_string_lossy()
            .contains("fit-sync.db"));
        assert_eq!(config.database_path.source, ConfigSource::Default);
        assert!(config.config_file.is_none());
        assert_eq!(config.sync.interval_secs, 30);
        assert_eq!(config.sync.max_retries, 3);
        assert!(config.sync.auto_sync);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "database_path: /custom/path/db.sqlite").unwrap();
        writeln!(file, "sync:").unwrap();
        writeln!(file, "  server_url: http://localhost:8080").unwrap();
        writeln!(file, "  max_retries: 5").unwrap();

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(
            config.database_path.value,
            PathBuf::from("/custom/path/db.sqlite")
        );
        assert_eq!(config.database_path.source, ConfigSource::File);
        assert_eq!(config.config_file, Some(config_path));
        assert_eq!(
            config.sync.server_url.as_deref(),
            Some("http://localhost:8080")
        );
        assert_eq!(config.sync.max_retries, 5);
        // Unset keys keep their defaults
        assert_eq!(config.sync.request_timeout_secs, 15);
        assert_eq!(config.sync.probe_interval_secs, 10);
    }

    #[test]
    fn test_relative_database_path_resolves_against_config_dir() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "database_path: data/fit.db\n").unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(
            config.database_path.value,
            temp_dir.path().join("data/fit.db")
        );
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "sync:\n  interval_secs: 60\n").unwrap();

        std::env::set_var("FIT_SYNC_INTERVAL", "5");
        std::env::set_var("FIT_DATABASE_PATH", "/tmp/env.db");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.sync.interval_secs, 5);
        assert_eq!(config.database_path.value, PathBuf::from("/tmp/env.db"));
        assert_eq!(config.database_path.source, ConfigSource::Environment);

        std::env::remove_var("FIT_SYNC_INTERVAL");
        std::env::remove_var("FIT_DATABASE_PATH");
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let mut file = std::fs::File::create(&config_path).unwrap();
        writeln!(file, "invalid: yaml: content: [").unwrap();

        let err = Config::load(Some(config_path)).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_zero_durations_are_rejected() {
        for key in ["interval_secs", "request_timeout_secs", "probe_interval_secs"] {
            let temp_dir = tempdir().unwrap();
            let config_path = temp_dir.path().join("config.yaml");
            std::fs::write(&config_path, format!("sync:\n  {}: 0\n", key)).unwrap();

            let err = Config::load(Some(config_path)).unwrap_err();
            assert!(
                matches!(err, ConfigError::ZeroDuration { key: k } if k == format!("sync.{}", key)),
                "{}",
                key
            );
        }
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_zero_interval_from_env_is_rejected() {
        let temp_dir = tempdir().unwrap();
        std::env::set_var("FIT_SYNC_INTERVAL", "0");

        let result = Config::load(Some(temp_dir.path().join("missing.yaml")));
        std::env::remove_var("FIT_SYNC_INTERVAL");

        assert!(matches!(
            result,
            Err(ConfigError::ZeroDuration {
                key: "sync.interval_secs"
            })
        ));
    }

    #[test]
    fn test_sync_config_durations() {
        let sync = SyncConfig {
            interval_secs: 45,
            ..SyncConfig::default()
        };
        assert!(!sync.is_configured());
        assert_eq!(sync.interval(), Duration::from_secs(45));
        assert_eq!(sync.request_timeout(), Duration::from_secs(15));
        assert_eq!(sync.probe_interval(), Duration::from_secs(10));
    }
}
