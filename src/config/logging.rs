//! Logging configuration.

use super::parse::{env_opt, env_or};
use super::ConfigError;

const DEFAULT_FILTER: &str = "pivot_core=info";

/// Where log lines are written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogTarget {
    Stdout,
    Stderr,
}

/// Logging configuration loaded from environment.
#[derive(Clone, Debug)]
pub struct LoggingConfig {
    /// Log level filter (from LOG_LEVEL or RUST_LOG).
    pub filter: String,
    /// JSON lines (`LOG_FORMAT=json`) or human-readable text.
    pub json: bool,
    /// Service name for structured logging.
    pub service_name: String,
    /// Log destination (`LOG_TARGET=stdout|stderr`).
    pub target: LogTarget,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: DEFAULT_FILTER.to_string(),
            json: true,
            service_name: "pivot".to_string(),
            target: LogTarget::Stdout,
        }
    }
}

impl LoggingConfig {
    /// Load configuration from environment variables.
    ///
    /// LOG_LEVEL accepts simple values: trace, debug, info, warn, error
    /// RUST_LOG accepts full tracing filter syntax: pivot_core=debug,hyper=warn
    pub fn from_env() -> Result<Self, ConfigError> {
        let format = env_or("LOG_FORMAT", "json").to_ascii_lowercase();
        let json = match format.as_str() {
            "json" => true,
            "text" | "pretty" => false,
            other => {
                return Err(ConfigError::Invalid {
                    key: "LOG_FORMAT".into(),
                    message: format!("expected json or text, got '{}'", other),
                })
            }
        };

        Ok(Self {
            filter: resolve_log_filter(env_opt("LOG_LEVEL"), env_opt("RUST_LOG")),
            json,
            service_name: env_or("SERVICE_NAME", "pivot"),
            target: resolve_log_target(
                env_opt("LOG_TARGET"),
                std::env::var_os("GATEWAY_INTERFACE").is_some(),
            )?,
        })
    }
}

/// Under CGI stdout carries the response, so logs always go to stderr.
fn resolve_log_target(target: Option<String>, cgi: bool) -> Result<LogTarget, ConfigError> {
    if cgi {
        return Ok(LogTarget::Stderr);
    }
    match target.map(|t| t.to_ascii_lowercase()).as_deref() {
        None | Some("stdout") => Ok(LogTarget::Stdout),
        Some("stderr") => Ok(LogTarget::Stderr),
        Some(other) => Err(ConfigError::Invalid {
            key: "LOG_TARGET".into(),
            message: format!("expected stdout or stderr, got '{}'", other),
        }),
    }
}

/// Priority: LOG_LEVEL > RUST_LOG > default (info)
fn resolve_log_filter(log_level: Option<String>, rust_log: Option<String>) -> String {
    if let Some(level) = log_level {
        let level = level.to_lowercase();
        match level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {
                return format!("pivot_core={}", level);
            }
            _ => {
                // Logging is not up yet.
                eprintln!(
                    "Warning: Invalid LOG_LEVEL '{}', expected: trace, debug, info, warn, error",
                    level
                );
            }
        }
    }

    rust_log.unwrap_or_else(|| DEFAULT_FILTER.to_string())
}
