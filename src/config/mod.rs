//! Configuration loaded from environment variables.
//!
//! # Example
//!
//! ```rust,ignore
//! use pivot_core::config::Config;
//!
//! let config = Config::from_env()?;
//! println!("Listen address: {}", config.server.listen_addr);
//! println!("Debug: {}", config.app.debug);
//! ```

mod app;
mod error;
mod logging;
mod parse;
mod pool;
mod server;

pub use app::AppConfig;
pub use error::ConfigError;
pub use logging::{LogTarget, LoggingConfig};
pub use parse::{parse_bool, parse_duration, parse_list, parse_size};
pub use pool::PoolConfig;
pub use server::{ServerConfig, DEFAULT_MAX_BODY_SIZE};

/// Complete application configuration.
#[derive(Clone, Debug, Default)]
pub struct Config {
    /// Dispatch-loop configuration.
    pub app: AppConfig,
    /// Message pool configuration.
    pub pool: PoolConfig,
    /// Host adapter configuration.
    pub server: ServerConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            app: AppConfig::from_env()?,
            pool: PoolConfig::from_env()?,
            server: ServerConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Print configuration summary to log.
    pub fn log_summary(&self) {
        use tracing::info;

        info!("Configuration loaded:");
        info!("  App: {}", self.app.name);
        info!("  Debug: {}", self.app.debug);
        info!("  Listen: {}", self.server.listen_addr);
        info!("  Max body size: {} bytes", self.server.max_body_size);
        info!("  Stream buffer: {} bytes", self.app.stream_buffer_size);
        info!("  JSON pool threshold: {} bytes", self.app.json_pool_threshold);

        if self.pool.enabled {
            info!("  Object pool: {} per kind", self.pool.max_size);
        } else {
            info!("  Object pool: disabled");
        }

        if !self.app.middleware.is_empty() {
            info!("  Middleware: {}", self.app.middleware.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();

        assert_eq!(config.server.listen_addr, "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.server.max_body_size, 10 * 1024 * 1024);
        assert_eq!(config.app.name, "pivot");
        assert!(!config.app.debug);
        assert!(config.app.middleware.is_empty());
        assert_eq!(config.app.stream_buffer_size, 8192);
        assert_eq!(config.app.json_pool_threshold, 4096);
        assert!(config.pool.enabled);
        assert_eq!(config.pool.max_size, 100);
        assert!(config.logging.json);
        assert_eq!(config.logging.filter, "pivot_core=info");
    }
}
