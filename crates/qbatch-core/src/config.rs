//! Configuration management.
//!
//! Supports loading configuration from:
//! 1. Configuration files (YAML)
//! 2. Environment variables (with `QBATCH_` prefix)
//!
//! Configuration precedence (highest to lowest):
//! 1. Environment variables
//! 2. Configuration file
//! 3. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pool::DEFAULT_WORKERS;

/// Default engine address for the HTTP transport.
pub const DEFAULT_ENGINE_URL: &str = "http://127.0.0.1:8001";

/// Complete configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// How to reach the engine.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Worker pool size.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Directory receiving request/response dumps.
    #[serde(default)]
    pub dump_dir: Option<PathBuf>,

    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Engine connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Base URL of the engine's HTTP interface.
    #[serde(default = "default_engine_url")]
    pub url: String,

    /// Engine executable; when set, the process transport is used.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Submit timeout in milliseconds; absent means no timeout.
    #[serde(default)]
    pub request_timeout_ms: Option<u64>,

    /// Optimization level for requests that do not set one.
    #[serde(default)]
    pub optimization_level: Option<u32>,
}

/// Which transport a configuration selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportConfig {
    Http {
        url: String,
        request_timeout: Option<Duration>,
    },
    Process {
        path: PathBuf,
    },
}

fn default_engine_url() -> String {
    DEFAULT_ENGINE_URL.to_string()
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            url: default_engine_url(),
            path: None,
            request_timeout_ms: None,
            optimization_level: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            workers: default_workers(),
            dump_dir: None,
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::IoError(e.to_string()))?;

        let config: Config = serde_yaml_ng::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration with the following precedence:
    /// 1. Load from file if provided
    /// 2. Apply environment variable overrides
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match config_file {
            Some(path) => Self::from_file(path)?,
            None => Config::default(),
        };

        let config = config.merge_env();
        config.validate()?;
        Ok(config)
    }

    /// Merge process environment variables into this configuration.
    pub fn merge_env(self) -> Self {
        self.merge_env_with(|key| std::env::var(key).ok())
    }

    /// Merge variables obtained from `lookup` into this configuration.
    ///
    /// Only variables that are set override the current values.
    pub fn merge_env_with<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("QBATCH_ENGINE_URL") {
            self.engine.url = v;
        }
        if let Some(v) = lookup("QBATCH_ENGINE_PATH") {
            self.engine.path = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("QBATCH_REQUEST_TIMEOUT_MS") {
            if let Ok(val) = v.parse() {
                self.engine.request_timeout_ms = Some(val);
            }
        }
        if let Some(v) = lookup("QBATCH_OPTIMIZATION") {
            if let Ok(val) = v.parse() {
                self.engine.optimization_level = Some(val);
            }
        }
        if let Some(v) = lookup(crate::pool::WORKERS_ENV) {
            if let Ok(val) = v.parse() {
                self.workers = val;
            }
        }
        if let Some(dir) = crate::engine::dump_dir_with(&lookup) {
            self.dump_dir = Some(dir);
        }
        if let Some(v) = lookup("QBATCH_LOG_LEVEL") {
            self.log_level = v;
        }

        self
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ValidationError(
                "workers must be greater than 0".to_string(),
            ));
        }

        if self.engine.url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "engine.url must not be empty".to_string(),
            ));
        }
        if !self.engine.url.starts_with("http://") && !self.engine.url.starts_with("https://") {
            return Err(ConfigError::ValidationError(format!(
                "Invalid engine url: {}",
                self.engine.url
            )));
        }

        if let Some(ref path) = self.engine.path {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::ValidationError(
                    "engine.path must not be empty; omit the field to use the HTTP engine"
                        .to_string(),
                ));
            }
        }

        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            other => {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid log level: {other}"
                )));
            }
        }

        Ok(())
    }

    /// The transport this configuration selects; an engine path wins over the URL.
    pub fn transport(&self) -> TransportConfig {
        match &self.engine.path {
            Some(path) => TransportConfig::Process { path: path.clone() },
            None => TransportConfig::Http {
                url: self.engine.url.clone(),
                request_timeout: self.engine.request_timeout_ms.map(Duration::from_millis),
            },
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.engine.url, DEFAULT_ENGINE_URL);
        assert_eq!(config.workers, 2);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.transport(),
            TransportConfig::Http {
                url: DEFAULT_ENGINE_URL.into(),
                request_timeout: None,
            }
        );
    }

    #[test]
    fn test_env_overrides() {
        let config = Config::default().merge_env_with(env(&[
            ("QBATCH_ENGINE_URL", "http://engine:9000"),
            ("QBATCH_WORKERS", "4"),
            ("QBATCH_REQUEST_TIMEOUT_MS", "1500"),
            ("QBATCH_OPTIMIZATION", "2"),
            ("QBATCH_LOG_LEVEL", "debug"),
        ]));

        assert_eq!(config.workers, 4);
        assert_eq!(config.engine.optimization_level, Some(2));
        assert_eq!(config.log_level, "debug");
        assert_eq!(
            config.transport(),
            TransportConfig::Http {
                url: "http://engine:9000".into(),
                request_timeout: Some(Duration::from_millis(1500)),
            }
        );
    }

    #[test]
    fn test_unparseable_env_is_ignored() {
        let config = Config::default().merge_env_with(env(&[("QBATCH_WORKERS", "many")]));
        assert_eq!(config.workers, 2);
    }

    #[test]
    fn test_engine_path_wins() {
        let config = Config::default()
            .merge_env_with(env(&[("QBATCH_ENGINE_PATH", "/usr/local/bin/engine")]));
        assert_eq!(
            config.transport(),
            TransportConfig::Process {
                path: PathBuf::from("/usr/local/bin/engine"),
            }
        );
    }

    #[test]
    fn test_dump_dir_legacy_variable() {
        let legacy = Config::default().merge_env_with(env(&[("TOASTER_DUMP_DIR", "/tmp/a")]));
        assert_eq!(legacy.dump_dir, Some(PathBuf::from("/tmp/a")));

        let both = Config::default().merge_env_with(env(&[
            ("TOASTER_DUMP_DIR", "/tmp/a"),
            ("QBATCH_DUMP_DIR", "/tmp/b"),
        ]));
        assert_eq!(both.dump_dir, Some(PathBuf::from("/tmp/b")));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.workers = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.log_level = "loud".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.url = "127.0.0.1:8001".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.path = Some(PathBuf::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("qbatch.yaml");
        std::fs::write(
            &path,
            "engine:\n  url: http://10.0.0.5:8001\n  request_timeout_ms: 250\nworkers: 3\n",
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.engine.url, "http://10.0.0.5:8001");
        assert_eq!(config.engine.request_timeout_ms, Some(250));
        assert_eq!(config.workers, 3);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            Config::from_file("/nonexistent/qbatch.yaml"),
            Err(ConfigError::IoError(_))
        ));
    }
}
