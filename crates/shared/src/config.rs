//! Configuration management for the provider workspace.
//!
//! This module handles loading and parsing configuration from TOML files.
//! Every section has defaults, so a partial file (or none at all) is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Data directory settings
    #[serde(default)]
    pub data: DataConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Fan-out limits
    #[serde(default)]
    pub concurrency: ConcurrencyConfig,

    /// HTTP transport settings
    #[serde(default)]
    pub http: HttpConfig,

    /// Provider selection
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Extractor routing
    #[serde(default)]
    pub extractors: ExtractorsConfig,
}

/// Data directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Root data directory path
    pub root_dir: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log directory path (relative to data directory or absolute)
    pub log_dir: String,

    /// Default log level (trace, debug, info, warn, error)
    pub default_level: String,

    /// Enable console output
    pub console: bool,

    /// Enable file output
    pub file: bool,

    /// Enable JSON formatting for file logs
    pub json_format: bool,
}

/// Default concurrency for each family of fan-out
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Providers queried at once (e.g. a search across every source)
    pub provider_fanout: usize,

    /// Listing pages fetched at once from a single provider
    pub page_fanout: usize,

    /// Video servers extracted at once for a single episode
    pub extraction_fanout: usize,
}

/// HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Per-request timeout in seconds
    pub timeout_seconds: u64,

    /// User agent sent with every request
    pub user_agent: String,

    /// Maximum retries for throttled or failed requests
    pub max_retries: u32,

    /// Base delay for retry (exponential backoff)
    pub retry_delay_ms: u64,
}

/// Provider selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Keys of providers that must not be registered
    pub disabled: Vec<String>,
}

/// Extractor routing
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorsConfig {
    /// Hosts whose embed pages are handled by the embedded-player extractor
    pub player_hosts: Vec<String>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            root_dir: "data".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            default_level: "info".to_string(),
            console: true,
            file: true,
            json_format: false,
        }
    }
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self {
            provider_fanout: 8,
            page_fanout: 3,
            extraction_fanout: 4,
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: 30,
            user_agent: concat!("provider-hub/", env!("CARGO_PKG_VERSION")).to_string(),
            max_retries: 2,
            retry_delay_ms: 500,
        }
    }
}

impl Default for ExtractorsConfig {
    fn default() -> Self {
        Self {
            player_hosts: vec![
                "filemoon.sx".to_string(),
                "streamwish.to".to_string(),
                "vidhide.com".to_string(),
                "mp4upload.com".to_string(),
            ],
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// If the file doesn't exist, returns the default configuration.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::warn!(
                path = %path.display(),
                "Config file not found, using defaults"
            );
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            disabled_providers = config.providers.disabled.len(),
            "Configuration loaded successfully"
        );

        Ok(config)
    }

    /// Load configuration from a TOML file or fall back to defaults on any error
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::from_file(path).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load config, using defaults");
            Self::default()
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        let content = toml::to_string_pretty(self)
            .context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::info!(
            path = %path.display(),
            "Configuration saved successfully"
        );

        Ok(())
    }

    /// Get the path for the data directory
    pub fn data_dir(&self) -> PathBuf {
        PathBuf::from(&self.data.root_dir)
    }

    /// Get the path for the log directory
    pub fn log_dir(&self) -> PathBuf {
        let log_path = Path::new(&self.logging.log_dir);
        if log_path.is_absolute() {
            log_path.to_path_buf()
        } else {
            self.data_dir().join(log_path)
        }
    }
}

impl HttpConfig {
    /// Request timeout as a duration
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.timeout_seconds)
    }
}

impl ProvidersConfig {
    /// Whether a provider key was switched off in the config
    pub fn is_disabled(&self, key: &str) -> bool {
        self.disabled.iter().any(|k| k == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.data.root_dir, "data");
        assert_eq!(config.concurrency.page_fanout, 3);
        assert_eq!(config.http.timeout(), std::time::Duration::from_secs(30));
        assert_eq!(config.http.max_retries, 2);
        assert!(config.providers.disabled.is_empty());
        assert!(!config.extractors.player_hosts.is_empty());
    }

    #[test]
    fn test_save_and_load_config() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("config.toml");

        let mut original_config = Config::default();
        original_config.concurrency.provider_fanout = 2;
        original_config.providers.disabled = vec!["gogo".to_string()];
        original_config.save(&config_path)?;

        assert!(config_path.exists());

        let loaded_config = Config::from_file(&config_path)?;
        assert_eq!(loaded_config.concurrency.provider_fanout, 2);
        assert!(loaded_config.providers.is_disabled("gogo"));
        assert!(!loaded_config.providers.is_disabled("zoro"));
        assert_eq!(loaded_config.http.user_agent, original_config.http.user_agent);

        Ok(())
    }

    #[test]
    fn test_partial_config_uses_defaults() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("partial.toml");
        std::fs::write(
            &config_path,
            concat!(
                "[concurrency]\nextraction_fanout = 9\n\n",
                "[extractors]\nplayer_hosts = [\"example.org\"]\n",
            ),
        )?;

        let config = Config::from_file(&config_path)?;
        assert_eq!(config.concurrency.extraction_fanout, 9);
        assert_eq!(config.concurrency.provider_fanout, 8);
        assert_eq!(config.extractors.player_hosts, vec!["example.org"]);
        assert_eq!(config.logging.default_level, "info");

        Ok(())
    }

    #[test]
    fn test_invalid_config_falls_back() -> Result<()> {
        let temp_dir = TempDir::new()?;
        let config_path = temp_dir.path().join("broken.toml");
        std::fs::write(&config_path, "[concurrency\nprovider_fanout = ")?;

        assert!(Config::from_file(&config_path).is_err());
        let config = Config::load_or_default(&config_path);
        assert_eq!(config.concurrency.provider_fanout, 8);

        Ok(())
    }

    #[test]
    fn test_load_nonexistent_config() {
        let config = Config::from_file("nonexistent.toml").unwrap();
        // Should return default config without error
        assert_eq!(config.data.root_dir, "data");
    }

    #[test]
    fn test_path_resolution() {
        let mut config = Config::default();
        assert!(config.log_dir().ends_with("data/logs"));

        config.logging.log_dir = "/var/log/hub".to_string();
        assert_eq!(config.log_dir(), PathBuf::from("/var/log/hub"));
    }
}
