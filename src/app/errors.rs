//! Converting escaped errors into responses.

use std::any::Any;

use http::StatusCode;
use serde_json::{json, Value};

use crate::core::Error;

/// Opaque correlation id shown to clients in production payloads.
pub fn new_error_id() -> String {
    format!("err_{}", uuid::Uuid::new_v4().simple())
}

/// Client-facing body for `err`.
///
/// Debug payloads carry the message, source location and backtrace.
/// Production payloads carry a generic message and `error_id` only.
pub fn error_payload(err: &Error, debug: bool, error_id: &str) -> Value {
    if debug {
        let mut payload = json!({
            "error": true,
            "message": err.to_string(),
            "file": err.file(),
            "line": err.line(),
            "trace": err.trace(),
        });
        if !err.suggestions().is_empty() {
            payload["available_routes"] = json!(err.suggestions());
        }
        payload
    } else {
        let message = if err.status() == StatusCode::NOT_FOUND {
            "Not Found"
        } else {
            "Internal Server Error"
        };
        json!({
            "error": true,
            "message": message,
            "error_id": error_id,
        })
    }
}

/// Log an escaped error with its correlation id.
///
/// Without an installed subscriber the line goes to stderr instead.
pub fn log_exception(err: &Error, error_id: &str) {
    if tracing::dispatcher::has_been_set() {
        tracing::error!(
            error_id = error_id,
            kind = ?err.kind(),
            status = err.status().as_u16(),
            file = err.file(),
            line = err.line(),
            trace = %err.trace(),
            "Exception: {}",
            err
        );
    } else {
        eprintln!(
            "[{}] Exception: {} in {}:{} ({})",
            crate::time::iso8601_now(),
            err,
            err.file(),
            err.line(),
            error_id
        );
    }
}

/// Text of a caught panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    match payload.downcast::<String>() {
        Ok(message) => *message,
        Err(payload) => match payload.downcast::<&'static str>() {
            Ok(message) => (*message).to_string(),
            Err(_) => "handler panicked".to_string(),
        },
    }
}
