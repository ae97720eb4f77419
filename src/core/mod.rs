//! Core types for HTTP request/response handling.
//!
//! - [`Request`] - hybrid request: convenience accessors plus a lazily built
//!   immutable message snapshot
//! - [`Response`] - hybrid response: fluent mutators, streaming, SSE and
//!   idempotent emission through an [`OutputSink`]
//! - [`Environment`] - the captured inbound request a host adapter hands in
//! - [`Error`] - core error types
//!
//! # Example
//!
//! ```rust,ignore
//! use pivot_core::core::{Request, Response};
//!
//! let req = Request::new("GET", "/users/:id", "/users/42")?;
//! let mut res = Response::new();
//! res.json(&serde_json::json!({"id": req.param("id")}));
//! ```

mod attributes;
mod data;
mod environment;
mod error;
pub mod request;
pub mod response;

pub use attributes::{AttributeValue, Attributes};
pub use data::Data;
pub use environment::{server_keys, Environment, EnvironmentBuilder, HttpVersion};
pub use error::{Cause, Error, ErrorKind, Result};
pub use request::{Request, RequestBuilder, RoutePattern};
pub use response::{
    BufferedOutput, CookieOptions, EventFields, OutputSink, Response, ResponseBuilder, SameSite,
    StdoutOutput,
};
