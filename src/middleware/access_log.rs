//! Access logging middleware.
//!
//! Logs one structured line per request after the rest of the chain ran.

use std::time::Instant;

use crate::core::{Request, Response, Result};

use super::{Middleware, Next};

/// Access log middleware configuration.
#[derive(Clone, Debug)]
pub struct AccessLogConfig {
    /// Whether logging is enabled.
    pub enabled: bool,
    /// Include the request body size.
    pub include_request_body: bool,
}

impl Default for AccessLogConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            include_request_body: false,
        }
    }
}

/// Access logging middleware.
///
/// Entries are emitted at INFO level with target "access", so the JSON
/// formatter tags them `"type": "access"`.
#[derive(Default)]
pub struct AccessLogMiddleware {
    config: AccessLogConfig,
}

impl AccessLogMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: AccessLogConfig) -> Self {
        Self { config }
    }

    pub fn with_enabled(enabled: bool) -> Self {
        Self {
            config: AccessLogConfig {
                enabled,
                ..Default::default()
            },
        }
    }
}

impl Middleware for AccessLogMiddleware {
    fn name(&self) -> &str {
        "access_log"
    }

    fn handle(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<()> {
        if !self.config.enabled {
            return next.run(req, res);
        }

        let started = Instant::now();
        let result = next.run(req, res);
        let duration_ms = started.elapsed().as_secs_f64() * 1000.0;

        // Failed requests are logged with the status they will be converted to.
        let status = match &result {
            Ok(()) => res.status_code(),
            Err(e) => e.status().as_u16(),
        };
        let request_bytes = self
            .config
            .include_request_body
            .then(|| req.environment().body().len());

        tracing::info!(
            target: "access",
            method = req.method(),
            path = req.path_callable(),
            query = req.environment().query_string(),
            status = status,
            bytes = res.body().len(),
            request_bytes = request_bytes,
            duration_ms = duration_ms,
            ip = %req.ip(),
            ua = req.header("user-agent"),
            referer = req.header("referer"),
            xff = req.header("x-forwarded-for"),
            http = req.environment().version().as_str(),
            "{} {} {}",
            req.method(),
            req.path_callable(),
            status
        );

        result
    }
}
