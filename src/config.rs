//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Backend connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_org")]
    pub org: String,

    pub username: Option<String>,

    pub password: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:5080".to_string()
}

fn default_org() -> String {
    "default".to_string()
}

fn default_request_timeout() -> u64 {
    300
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            org: default_org(),
            username: None,
            password: None,
            timeout_secs: default_request_timeout(),
        }
    }
}

/// Search request construction and result merging
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_rows_per_page")]
    pub rows_per_page: i64,

    /// Cap on distinct series kept when merging range-query chunks
    #[serde(default = "default_max_series")]
    pub max_series: usize,

    /// Send `sql` and the histogram aggregation base64-encoded
    #[serde(default)]
    pub base64_encoding: bool,

    #[serde(default = "default_timestamp_column")]
    pub timestamp_column: String,

    #[serde(default)]
    pub quick_mode: bool,
}

fn default_rows_per_page() -> i64 {
    50
}

fn default_max_series() -> usize {
    100
}

fn default_timestamp_column() -> String {
    "_timestamp".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            rows_per_page: default_rows_per_page(),
            max_series: default_max_series(),
            base64_encoding: false,
            timestamp_column: default_timestamp_column(),
            quick_mode: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from default locations or environment
    pub fn load_default() -> Self {
        let config_paths = [
            dirs::config_dir().map(|p| p.join("logscope").join("config.toml")),
            Some(PathBuf::from("./logscope.toml")),
        ];

        for path in config_paths.iter().flatten() {
            if path.exists() {
                match Self::load_with_env(path) {
                    Ok(config) => {
                        tracing::info!("Loaded config from {:?}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {:?}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("Using default config with environment overrides");
        Self::from_env()
    }

    fn apply_env_overrides(&mut self) {
        // API overrides
        if let Ok(url) = std::env::var("LOGSCOPE_BASE_URL") {
            self.api.base_url = url;
        }
        if let Ok(org) = std::env::var("LOGSCOPE_ORG") {
            self.api.org = org;
        }
        if let Ok(username) = std::env::var("LOGSCOPE_USERNAME") {
            self.api.username = Some(username);
        }
        if let Ok(password) = std::env::var("LOGSCOPE_PASSWORD") {
            self.api.password = Some(password);
        }

        // Search overrides
        if let Ok(max_series) = std::env::var("LOGSCOPE_MAX_SERIES") {
            if let Ok(n) = max_series.parse() {
                self.search.max_series = n;
            }
        }
        if let Ok(encoding) = std::env::var("LOGSCOPE_BASE64") {
            self.search.base64_encoding = matches!(encoding.as_str(), "1" | "true" | "yes");
        }

        // Logging overrides
        if let Ok(level) = std::env::var("LOGSCOPE_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOGSCOPE_LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# Logscope Configuration
#
# Environment variables override these settings:
# - LOGSCOPE_BASE_URL
# - LOGSCOPE_ORG
# - LOGSCOPE_USERNAME / LOGSCOPE_PASSWORD
# - LOGSCOPE_MAX_SERIES
# - LOGSCOPE_BASE64
# - LOGSCOPE_LOG_LEVEL
# - LOGSCOPE_LOG_FORMAT

[api]
# Backend base URL
base_url = "http://localhost:5080"

# Organization identifier used in request paths
org = "default"

# Basic auth credentials (optional)
# username = "root@example.com"
# password = ""

# Request timeout in seconds
timeout_secs = 300

[search]
# Rows fetched per page
rows_per_page = 50

# Maximum distinct series kept when merging range-query chunks
max_series = 100

# Base64-encode SQL in request bodies
base64_encoding = false

# Timestamp column used for histograms and ordering checks
timestamp_column = "_timestamp"

# Ask the backend for quick mode (fewer columns)
quick_mode = false

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.org, "default");
        assert_eq!(config.search.rows_per_page, 50);
        assert_eq!(config.search.max_series, 100);
        assert_eq!(config.search.timestamp_column, "_timestamp");
        assert!(!config.search.base64_encoding);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_generated_config_parses() {
        let config: Config = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.api.base_url, "http://localhost:5080");
        assert_eq!(config.search.max_series, 100);
    }

    #[test]
    fn test_load_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search]\nmax_series = 7\nbase64_encoding = true").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.search.max_series, 7);
        assert!(config.search.base64_encoding);
        assert_eq!(config.search.rows_per_page, 50);
        assert_eq!(config.api.org, "default");
    }

    #[test]
    fn test_load_errors() {
        let missing = Config::load(Path::new("/nonexistent/logscope.toml"));
        assert!(matches!(missing, Err(ConfigError::Io { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[search\nmax_series = ").unwrap();
        assert!(matches!(Config::load(file.path()), Err(ConfigError::Parse { .. })));
    }
}
