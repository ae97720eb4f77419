//! Object pool configuration.

use super::parse::{env_bool, env_parse};
use super::ConfigError;
use crate::pool::DEFAULT_CAPACITY;

/// Message pool settings loaded from environment.
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Whether returned objects are retained (POOL_ENABLED).
    pub enabled: bool,
    /// Capacity per kind (POOL_MAX_SIZE).
    pub max_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: DEFAULT_CAPACITY,
        }
    }
}

impl PoolConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            enabled: env_bool("POOL_ENABLED", true),
            max_size: env_parse("POOL_MAX_SIZE", DEFAULT_CAPACITY)?,
        })
    }
}
