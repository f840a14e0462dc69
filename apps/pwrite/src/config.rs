//! Client configuration.
//!
//! Configuration is stored as TOML at `$XDG_CONFIG_HOME/pwrite/config.toml`,
//! falling back to `~/.config/pwrite/config.toml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use pwrite_upload::{DEFAULT_BASE_URL, HttpTransportConfig, RetryPolicy, UploadOptions};
use serde::{Deserialize, Serialize};

/// Client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// API root of the iRODS HTTP API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Number of concurrent write streams.
    #[serde(default = "default_stream_count")]
    pub stream_count: u32,

    /// Maximum payload bytes per frame.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default)]
    pub retry: RetryConfig,
}

/// `[retry]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Sends per frame, including the first (1 = no retry).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_stream_count() -> u32 {
    4
}

fn default_buffer_size() -> usize {
    4 * 1024 * 1024
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    1
}

fn default_initial_delay_ms() -> u64 {
    250
}

fn default_max_delay_ms() -> u64 {
    15_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: None,
            password: None,
            stream_count: default_stream_count(),
            buffer_size: default_buffer_size(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_factor: default_backoff_factor(),
        }
    }
}

impl Config {
    /// Loads configuration from `explicit`, or from the default location.
    ///
    /// An explicit path must exist; a missing default file yields defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        match config_path() {
            Some(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Rejects values no upload can run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(self.stream_count >= 1, "stream_count must be at least 1");
        anyhow::ensure!(self.buffer_size >= 1, "buffer_size must be at least 1");
        anyhow::ensure!(
            self.retry.max_attempts >= 1,
            "retry.max_attempts must be at least 1"
        );
        anyhow::ensure!(
            self.retry.backoff_factor >= 1.0,
            "retry.backoff_factor must be at least 1.0"
        );
        Ok(())
    }

    pub fn http_config(&self) -> HttpTransportConfig {
        HttpTransportConfig {
            base_url: self.base_url.clone(),
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn upload_options(&self) -> UploadOptions {
        UploadOptions {
            buffer_size: self.buffer_size,
            retry: RetryPolicy {
                max_attempts: self.retry.max_attempts,
                initial_delay: Duration::from_millis(self.retry.initial_delay_ms),
                max_delay: Duration::from_millis(self.retry.max_delay_ms),
                backoff_factor: self.retry.backoff_factor,
            },
        }
    }
}

/// Returns the default configuration file path, if a home can be found.
fn config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
    Some(base.join("pwrite").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.base_url, "http://localhost:9000/irods-http-api/0.5.0");
        assert_eq!(config.stream_count, 4);
        assert_eq!(config.buffer_size, 4 * 1024 * 1024);
        assert_eq!(config.request_timeout_secs, 300);
        assert_eq!(config.connect_timeout_secs, 30);
        assert_eq!(config.retry.max_attempts, 1);
        assert!(config.username.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            username = "rods"
            stream_count = 8

            [retry]
            max_attempts = 3
            "#,
        )
        .unwrap();

        assert_eq!(config.username.as_deref(), Some("rods"));
        assert_eq!(config.stream_count, 8);
        assert_eq!(config.buffer_size, 4 * 1024 * 1024);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay_ms, 250);
        assert_eq!(config.retry.backoff_factor, 2.0);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = Config {
            base_url: "https://irods.example.org/api".into(),
            username: Some("alice".into()),
            password: Some("s3cret".into()),
            stream_count: 2,
            buffer_size: 65536,
            request_timeout_secs: 60,
            connect_timeout_secs: 5,
            retry: RetryConfig {
                max_attempts: 4,
                initial_delay_ms: 100,
                max_delay_ms: 2000,
                backoff_factor: 3.0,
            },
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn load_from_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "base_url = \"http://irods:9000/api\"\nbuffer_size = 1024\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.base_url, "http://irods:9000/api");
        assert_eq!(config.buffer_size, 1024);
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&tmp.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("nope.toml"));
    }

    #[test]
    fn malformed_file_is_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "stream_count = \"many\"").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn validate_rejects_unusable_values() {
        let mut config = Config {
            stream_count: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        config.stream_count = 1;
        config.buffer_size = 0;
        assert!(config.validate().is_err());

        config.buffer_size = 1;
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn converts_to_library_settings() {
        let config = Config {
            buffer_size: 1000,
            connect_timeout_secs: 7,
            request_timeout_secs: 70,
            retry: RetryConfig {
                max_attempts: 3,
                initial_delay_ms: 10,
                max_delay_ms: 40,
                backoff_factor: 1.5,
            },
            ..Config::default()
        };

        let http = config.http_config();
        assert_eq!(http.base_url, config.base_url);
        assert_eq!(http.connect_timeout, Duration::from_secs(7));
        assert_eq!(http.request_timeout, Duration::from_secs(70));

        let opts = config.upload_options();
        assert_eq!(opts.buffer_size, 1000);
        assert_eq!(opts.retry.max_attempts, 3);
        assert_eq!(opts.retry.initial_delay, Duration::from_millis(10));
        assert_eq!(opts.retry.max_delay, Duration::from_millis(40));
        assert_eq!(opts.retry.backoff_factor, 1.5);
    }

    #[test]
    fn config_path_ends_in_pwrite() {
        if let Some(path) = config_path() {
            assert!(path.ends_with("pwrite/config.toml"));
        }
    }
}
