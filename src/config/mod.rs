// Configuration module entry point
// Loads application configuration and holds shared runtime state

mod state;
mod types;

use std::net::SocketAddr;
use std::time::Duration;

// Re-export public types
pub use state::AppState;
pub use types::{Config, StorageConfig};

/// Default config file (extension resolved by the `config` crate)
pub const DEFAULT_CONFIG_PATH: &str = "config";

/// Longest validity SigV4 allows for a presigned URL
const MAX_PRESIGN_EXPIRY_SECS: u64 = 7 * 24 * 3600;

impl Config {
    /// Load configuration from specified file path (without extension)
    ///
    /// Sources, lowest priority first: defaults, the file (optional),
    /// `REDIRECT_*` environment variables (`__` separates nested keys).
    pub fn load_from(config_path: &str) -> Result<Self, config::ConfigError> {
        Self::builder()?
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("REDIRECT")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<Self>()?
            .validated()
    }

    /// Reject values that would make every request fail
    fn validated(self) -> Result<Self, config::ConfigError> {
        let expiry = self.storage.presign_expiry_secs;
        if !(1..=MAX_PRESIGN_EXPIRY_SECS).contains(&expiry) {
            return Err(config::ConfigError::Message(format!(
                "storage.presign_expiry_secs must be between 1 and {MAX_PRESIGN_EXPIRY_SECS}, got {expiry}"
            )));
        }
        if self.storage.request_timeout_secs == 0 {
            return Err(config::ConfigError::Message(
                "storage.request_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }

    /// Builder pre-populated with every default
    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError>
    {
        config::Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 4000)?
            .set_default("logging.level", "info")?
            .set_default("logging.access_log", true)?
            .set_default("logging.access_log_format", "combined")?
            .set_default("performance.keep_alive_timeout", 75)?
            .set_default("performance.read_timeout", 30)?
            .set_default("storage.presign_expiry_secs", 3600)? // 60 minutes
            .set_default("storage.request_timeout_secs", 10)?
            .set_default("storage.force_path_style", false)
    }

    pub fn get_socket_addr(&self) -> Result<SocketAddr, String> {
        format!("{}:{}", self.server.host, self.server.port)
            .parse()
            .map_err(|e| format!("Invalid address: {e}"))
    }

    pub const fn presign_expiry(&self) -> Duration {
        Duration::from_secs(self.storage.presign_expiry_secs)
    }

    pub const fn storage_timeout(&self) -> Duration {
        Duration::from_secs(self.storage.request_timeout_secs)
    }

    /// Bound on waiting for request headers, including between keep-alive requests
    pub const fn header_read_timeout(&self) -> Duration {
        Duration::from_secs(self.performance.read_timeout)
    }
}

#[cfg(test)]
impl Config {
    /// Defaults overlaid with an inline TOML document
    pub fn from_toml(toml: &str) -> Result<Self, config::ConfigError> {
        Self::builder()?
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()?
            .try_deserialize::<Self>()?
            .validated()
    }
}
