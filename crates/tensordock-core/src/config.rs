//! Configuration and credentials for marketplace clients.
//!
//! The configuration lives in a YAML file (by default `~/.tensordock.yml`) holding
//! the service URL, the API key/token pair, the diagnostics flag and the SSH key
//! used by remote-shell commands.

use crate::Error;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use url::Url;
use validator::Validate;

/// Default marketplace endpoint.
pub const DEFAULT_SERVICE_URL: &str = "https://marketplace.tensordock.com/api/v0/client";

/// Default SSH private key used by remote-shell commands.
pub const DEFAULT_KEY_PATH: &str = "~/.ssh/id_rsa";

/// File name of the configuration in the user's home directory.
pub const CONFIG_FILE_NAME: &str = ".tensordock.yml";

/// Settings for a marketplace client instance.
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MarketplaceConfig {
    /// Marketplace API base URL
    #[validate(url)]
    #[serde(default = "default_service_url", alias = "serviceurl")]
    pub service_url: String,

    /// API key
    #[serde(default, alias = "apikey")]
    pub api_key: String,

    /// API token
    #[serde(default, alias = "apitoken")]
    pub api_token: String,

    /// Dump raw requests and responses
    #[serde(default)]
    pub debug: bool,

    /// SSH private key for remote-shell commands
    #[serde(default = "default_key_path", alias = "keypath")]
    pub key_path: String,
}

fn default_service_url() -> String {
    DEFAULT_SERVICE_URL.to_string()
}

fn default_key_path() -> String {
    DEFAULT_KEY_PATH.to_string()
}

impl MarketplaceConfig {
    /// Create a configuration pointing at the given service URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL fails validation.
    pub fn new(service_url: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            service_url: service_url.into(),
            ..Self::default()
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(config)
    }

    /// Location of the configuration file in the user's home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn default_path() -> Result<PathBuf, Error> {
        dirs::home_dir()
            .map(|home| home.join(CONFIG_FILE_NAME))
            .ok_or_else(|| Error::ConfigError("Unable to determine home directory".to_string()))
    }

    /// Load the configuration from `path`.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, parsed or validated.
    pub fn load(path: &Path) -> Result<Self, Error> {
        if !path.exists() {
            warn!("config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }

        debug!("loading config from {}", path.display());
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read {}: {e}", path.display()))
        })?;

        // An empty file parses as YAML null rather than an empty mapping.
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Self = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the configuration to `path`, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails or the file cannot be written.
    pub fn save(&self, path: &Path) -> Result<(), Error> {
        self.validate()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::ConfigError(format!("Failed to create {}: {e}", parent.display()))
            })?;
        }

        let contents = serde_yaml::to_string(self)?;
        std::fs::write(path, contents)
            .map_err(|e| Error::ConfigError(format!("Failed to write {}: {e}", path.display())))
    }

    /// Set the API key and token.
    #[must_use]
    pub fn with_credentials(
        mut self,
        api_key: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Self {
        self.api_key = api_key.into();
        self.api_token = api_token.into();
        self
    }

    /// Enable or disable wire dumps.
    #[must_use]
    pub const fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the SSH key path.
    #[must_use]
    pub fn with_key_path(mut self, key_path: impl Into<String>) -> Self {
        self.key_path = key_path.into();
        self
    }

    /// Parse and validate the service URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed.
    pub fn parse_service_url(&self) -> Result<Url, Error> {
        Url::parse(&self.service_url)
            .map_err(|e| Error::ConfigError(format!("Invalid service URL: {e}")))
    }

    /// Credentials from this configuration, if both key and token are set.
    #[must_use]
    pub fn credentials(&self) -> Option<Credentials> {
        if self.api_key.is_empty() || self.api_token.is_empty() {
            return None;
        }
        Some(Credentials::new(self.api_key.clone(), self.api_token.clone()))
    }
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            service_url: default_service_url(),
            api_key: String::new(),
            api_token: String::new(),
            debug: false,
            key_path: default_key_path(),
        }
    }
}

/// API key and token attached to every authenticated call.
pub struct Credentials {
    api_key: String,
    api_token: SecretString,
}

impl Credentials {
    /// Create a credential pair.
    #[must_use]
    pub fn new(api_key: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_token: SecretString::new(api_token.into().into_boxed_str()),
        }
    }

    /// The API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// The API token.
    #[must_use]
    pub const fn api_token(&self) -> &SecretString {
        &self.api_token
    }
}

impl Clone for Credentials {
    fn clone(&self) -> Self {
        Self::new(self.api_key.clone(), self.api_token.expose_secret())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_token", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.api_key == other.api_key
            && self.api_token.expose_secret() == other.api_token.expose_secret()
    }
}
