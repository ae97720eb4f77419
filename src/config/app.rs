//! Application configuration.

use super::parse::{env_bool, env_opt, env_or, env_parse, parse_list};
use super::ConfigError;
use crate::core::response::DEFAULT_STREAM_BUFFER_SIZE;
use crate::json::DEFAULT_POOL_THRESHOLD;

/// Dispatch-loop settings loaded from environment.
#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Application name (APP_NAME).
    pub name: String,
    /// Verbose error payloads (APP_DEBUG).
    pub debug: bool,
    /// Middleware aliases loaded at boot (APP_MIDDLEWARE, comma separated).
    pub middleware: Vec<String>,
    /// Chunk size for file and reader streaming.
    pub stream_buffer_size: usize,
    /// Estimated JSON size above which the pooled encoder is used.
    pub json_pool_threshold: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "pivot".to_string(),
            debug: false,
            middleware: Vec::new(),
            stream_buffer_size: DEFAULT_STREAM_BUFFER_SIZE,
            json_pool_threshold: DEFAULT_POOL_THRESHOLD,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let stream_buffer_size = env_parse("STREAM_BUFFER_SIZE", DEFAULT_STREAM_BUFFER_SIZE)?;
        if stream_buffer_size == 0 {
            return Err(ConfigError::Invalid {
                key: "STREAM_BUFFER_SIZE".into(),
                message: "must be greater than zero".into(),
            });
        }

        Ok(Self {
            name: env_or("APP_NAME", "pivot"),
            debug: env_bool("APP_DEBUG", false),
            middleware: env_opt("APP_MIDDLEWARE")
                .map(|v| parse_list(&v))
                .unwrap_or_default(),
            stream_buffer_size,
            json_pool_threshold: env_parse("JSON_POOL_THRESHOLD", DEFAULT_POOL_THRESHOLD)?,
        })
    }
}
