//! Configuration types and loading
//!
//! Config precedence: env vars > config file > defaults. The config file
//! itself is found via `--config`, then `CONFIG_PATH`, then `notes.toml` in
//! the working directory. Only an explicitly named file has to exist.
//! The login password is never read from the TOML.

use api_client::{ClientConfig, HeaderInjection};
use serde::Deserialize;
use session_auth::DEFAULT_API_BASE_URL;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_CONFIG_FILE: &str = "notes.toml";

/// Root configuration
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub headers: Vec<HeaderInjection>,
}

/// Backend connection settings
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

/// Where the session's tokens are kept between runs
#[derive(Debug, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_credentials_path")]
    pub credentials_path: PathBuf,
}

fn default_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_credentials_path() -> PathBuf {
    PathBuf::from("credentials.json")
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_path: default_credentials_path(),
        }
    }
}

/// Resolved config file location.
#[derive(Debug, PartialEq, Eq)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// Named by `--config` or `CONFIG_PATH`, so it must exist.
    pub explicit: bool,
}

impl Config {
    /// Load configuration from `source`, then overlay environment variables.
    ///
    /// A missing default file yields the built-in defaults.
    pub fn load(source: &ConfigSource) -> common::Result<Self> {
        let mut config = match std::fs::read_to_string(&source.path) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !source.explicit => {
                Config::default()
            }
            Err(e) => return Err(e.into()),
        };

        if let Ok(url) = std::env::var("API_BASE_URL") {
            config.api.base_url = url;
        }
        if let Ok(path) = std::env::var("CREDENTIALS_PATH") {
            config.storage.credentials_path = PathBuf::from(path);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> common::Result<()> {
        if !self.api.base_url.starts_with("http://") && !self.api.base_url.starts_with("https://") {
            return Err(common::Error::config(format!(
                "base_url must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(common::Error::config("timeout_secs must be greater than 0"));
        }

        if self
            .headers
            .iter()
            .any(|h| h.name.eq_ignore_ascii_case("authorization"))
        {
            return Err(common::Error::config(
                "authorization cannot be configured as a default header",
            ));
        }

        Ok(())
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&Path>) -> ConfigSource {
        if let Some(p) = cli_path {
            return ConfigSource {
                path: p.to_path_buf(),
                explicit: true,
            };
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return ConfigSource {
                path: PathBuf::from(p),
                explicit: true,
            };
        }
        ConfigSource {
            path: PathBuf::from(DEFAULT_CONFIG_FILE),
            explicit: false,
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.api.base_url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(self.api.timeout_secs),
            default_headers: self.headers.clone(),
        }
    }
}
