//! Server configuration.

use std::net::SocketAddr;
use std::time::Duration;

use super::parse::{env_duration, env_or, env_size};
use super::ConfigError;

/// Default request body limit (10 MiB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Host adapter configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Listen address (default: 0.0.0.0:8080).
    pub listen_addr: SocketAddr,
    /// Largest accepted request body in bytes.
    pub max_body_size: usize,
    /// Graceful shutdown drain timeout.
    pub drain_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let listen = env_or("LISTEN_ADDR", "0.0.0.0:8080");
        let listen_addr: SocketAddr = listen
            .parse()
            .map_err(|e| ConfigError::parse("LISTEN_ADDR", listen.as_str(), e))?;

        let drain_timeout = env_duration("DRAIN_TIMEOUT", "30s")?.unwrap_or(Duration::ZERO);

        Ok(Self {
            listen_addr,
            max_body_size: env_size("MAX_BODY_SIZE", DEFAULT_MAX_BODY_SIZE)?,
            drain_timeout,
        })
    }
}
