//! Relay configuration

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::registry::RegistryConfig;

/// Environment variable naming the directory room audio is uploaded to
pub const ENV_UPLOAD_DIR: &str = "BARAZA_UPLOAD_DIR";
/// Environment variable capping concurrent listener sessions
pub const ENV_MAX_LISTENERS: &str = "BARAZA_MAX_LISTENERS";
/// Environment variable bounding the offer/answer exchange, in seconds
pub const ENV_NEGOTIATION_TIMEOUT: &str = "BARAZA_NEGOTIATION_TIMEOUT_SECS";

/// Invalid configuration value
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    InvalidValue {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
}

/// Relay configuration options
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Directory holding one uploaded audio file per room
    pub upload_dir: PathBuf,

    /// Maximum concurrent listener sessions (0 = unlimited)
    pub max_listeners: usize,

    /// Upper bound on a session's offer/answer exchange
    pub negotiation_timeout: Duration,

    /// Source registry settings
    pub registry: RegistryConfig,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            upload_dir: PathBuf::from("uploads"),
            max_listeners: 0, // Unlimited
            negotiation_timeout: Duration::from_secs(30),
            registry: RegistryConfig::default(),
        }
    }
}

impl RelayConfig {
    /// Create a config serving rooms from `dir`
    pub fn with_upload_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: dir.into(),
            ..Default::default()
        }
    }

    /// Build a config from `BARAZA_*` environment variables
    ///
    /// Unset variables keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(dir) = lookup(ENV_UPLOAD_DIR) {
            config.upload_dir = PathBuf::from(dir);
        }

        if let Some(value) = lookup(ENV_MAX_LISTENERS) {
            config.max_listeners =
                value
                    .trim()
                    .parse()
                    .map_err(|_| ConfigError::InvalidValue {
                        name: ENV_MAX_LISTENERS,
                        expected: "a non-negative integer",
                        value,
                    })?;
        }

        if let Some(value) = lookup(ENV_NEGOTIATION_TIMEOUT) {
            let secs: u64 = match value.trim().parse() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        name: ENV_NEGOTIATION_TIMEOUT,
                        expected: "a positive number of seconds",
                        value,
                    })
                }
            };
            config.negotiation_timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }

    /// Set the upload directory
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    /// Set maximum concurrent listeners
    pub fn max_listeners(mut self, max: usize) -> Self {
        self.max_listeners = max;
        self
    }

    /// Set the negotiation timeout
    pub fn negotiation_timeout(mut self, timeout: Duration) -> Self {
        self.negotiation_timeout = timeout;
        self
    }

    /// Set the registry configuration
    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }
}
