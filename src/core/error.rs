//! Core error types.
//!
//! Every [`Error`] remembers where it was created and carries a backtrace
//! (captured according to `RUST_BACKTRACE`), so the dispatch loop can render
//! `file`/`line`/`trace` in debug payloads without the error sites doing
//! anything special.

use std::backtrace::{Backtrace, BacktraceStatus};
use std::fmt;
use std::panic::Location;

use http::StatusCode;

/// Broad error classification used by the dispatch loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input to a constructor or setter.
    InvalidArgument,
    /// No route matched the request.
    RouteNotFound,
    /// Application error carrying an explicit HTTP status.
    Http,
    /// Anything else.
    Internal,
}

/// What went wrong.
#[derive(Debug)]
pub enum Cause {
    /// Invalid argument.
    InvalidArgument(String),

    /// A route handler could not be resolved or invoked.
    InvalidHandler {
        handler_type: &'static str,
        target: String,
        method: String,
        message: String,
    },

    /// No route for method + path.
    RouteNotFound {
        method: String,
        path: String,
        suggestions: Vec<String>,
    },

    /// Error with an HTTP status code.
    Http { status: StatusCode, message: String },

    /// I/O error.
    Io(std::io::Error),

    /// JSON error.
    Json(serde_json::Error),

    /// Unclassified error with message.
    Internal(String),

    /// Foreign error.
    Other(Box<dyn std::error::Error + Send + Sync>),
}

/// Crate error.
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    cause: Cause,
    location: &'static Location<'static>,
    backtrace: Backtrace,
}

impl Error {
    #[track_caller]
    pub fn new(cause: Cause) -> Self {
        Self {
            inner: Box::new(Inner {
                cause,
                location: Location::caller(),
                backtrace: Backtrace::capture(),
            }),
        }
    }

    #[track_caller]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(Cause::InvalidArgument(message.into()))
    }

    #[track_caller]
    pub fn invalid_handler(
        handler_type: &'static str,
        target: impl Into<String>,
        method: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(Cause::InvalidHandler {
            handler_type,
            target: target.into(),
            method: method.into(),
            message: message.into(),
        })
    }

    #[track_caller]
    pub fn route_not_found(
        method: impl Into<String>,
        path: impl Into<String>,
        suggestions: Vec<String>,
    ) -> Self {
        Self::new(Cause::RouteNotFound {
            method: method.into(),
            path: path.into(),
            suggestions,
        })
    }

    /// Error that renders with the given status code.
    #[track_caller]
    pub fn http(status: StatusCode, message: impl Into<String>) -> Self {
        Self::new(Cause::Http {
            status,
            message: message.into(),
        })
    }

    #[track_caller]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(Cause::Internal(message.into()))
    }

    #[track_caller]
    pub fn other<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::new(Cause::Other(Box::new(error)))
    }

    #[inline]
    pub fn cause(&self) -> &Cause {
        &self.inner.cause
    }

    pub fn kind(&self) -> ErrorKind {
        match self.inner.cause {
            Cause::InvalidArgument(_) | Cause::InvalidHandler { .. } => ErrorKind::InvalidArgument,
            Cause::RouteNotFound { .. } => ErrorKind::RouteNotFound,
            Cause::Http { .. } => ErrorKind::Http,
            Cause::Io(_) | Cause::Json(_) | Cause::Internal(_) | Cause::Other(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// HTTP status this error maps to.
    pub fn status(&self) -> StatusCode {
        match &self.inner.cause {
            Cause::Http { status, .. } => *status,
            Cause::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Route suggestions attached to a not-found error.
    pub fn suggestions(&self) -> &[String] {
        match &self.inner.cause {
            Cause::RouteNotFound { suggestions, .. } => suggestions,
            _ => &[],
        }
    }

    /// Source file where the error was created.
    #[inline]
    pub fn file(&self) -> &'static str {
        self.inner.location.file()
    }

    #[inline]
    pub fn line(&self) -> u32 {
        self.inner.location.line()
    }

    /// Rendered backtrace, empty when capture is disabled.
    pub fn trace(&self) -> String {
        match self.inner.backtrace.status() {
            BacktraceStatus::Captured => self.inner.backtrace.to_string(),
            _ => String::new(),
        }
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Error")
            .field("cause", &self.inner.cause)
            .field("file", &self.file())
            .field("line", &self.line())
            .finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner.cause {
            Cause::InvalidArgument(msg) => f.write_str(msg),
            Cause::InvalidHandler {
                handler_type,
                target,
                method,
                message,
            } => write!(
                f,
                "invalid route handler ({} {}::{}): {}",
                handler_type, target, method, message
            ),
            Cause::RouteNotFound { method, path, .. } => {
                write!(f, "route not found: {} {}", method, path)
            }
            Cause::Http { message, .. } => f.write_str(message),
            Cause::Io(e) => write!(f, "I/O error: {}", e),
            Cause::Json(e) => write!(f, "JSON error: {}", e),
            Cause::Internal(msg) => f.write_str(msg),
            Cause::Other(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.inner.cause {
            Cause::Io(e) => Some(e),
            Cause::Json(e) => Some(e),
            Cause::Other(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    #[track_caller]
    fn from(e: std::io::Error) -> Self {
        Error::new(Cause::Io(e))
    }
}

impl From<serde_json::Error> for Error {
    #[track_caller]
    fn from(e: serde_json::Error) -> Self {
        Error::new(Cause::Json(e))
    }
}

impl From<String> for Error {
    #[track_caller]
    fn from(msg: String) -> Self {
        Error::new(Cause::Internal(msg))
    }
}

impl From<&str> for Error {
    #[track_caller]
    fn from(msg: &str) -> Self {
        Error::new(Cause::Internal(msg.to_string()))
    }
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
