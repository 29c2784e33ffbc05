//! Server configuration.
//!
//! Every field has a default matching the reference deployment, so an empty
//! (or absent) TOML file yields a working server:
//!
//! ```toml
//! listen = "0.0.0.0:6667"
//! max_clients = 100
//! username_framing = "line"   # or "fixed" for 32-byte legacy clients
//! write_timeout_secs = 10
//! ```

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use chanrelay_protocol::UsernameFraming;

/// Default TCP port
pub const DEFAULT_PORT: u16 = 6667;

/// Default maximum number of registered sessions
pub const DEFAULT_MAX_CLIENTS: usize = 100;

/// Default per-write timeout in seconds
const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Relay server configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Address the acceptor binds
    pub listen: SocketAddr,

    /// Registry capacity
    pub max_clients: usize,

    /// How the username frame is read during the handshake
    pub username_framing: UsernameFraming,

    /// Upper bound on one write to a client transport
    pub write_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            max_clients: DEFAULT_MAX_CLIENTS,
            username_framing: UsernameFraming::default(),
            write_timeout_secs: DEFAULT_WRITE_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text and validate it.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: ServerConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks invariants serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_clients == 0 {
            return Err(ConfigError::Invalid(
                "max_clients must be at least 1".to_string(),
            ));
        }
        if self.write_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "write_timeout_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}
