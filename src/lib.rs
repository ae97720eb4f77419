//! pivot_core - request pipeline for a lightweight web microframework.
//!
//! An [`Application`] owns routes, middleware and the per-request dispatch
//! cycle. Requests enter either through the CGI entry point
//! ([`Application::run`]) or through the HTTP host adapter in [`server`].
//!
//! # Features
//!
//! - **Hybrid request/response**: a mutable, fluent API plus immutable
//!   message snapshots with `with_*` copies
//! - **Object pooling**: bounded reuse of message components via [`pool`]
//! - **Middleware pipeline**: onion-ordered, short-circuiting [`middleware`]
//! - **Streaming**: chunked writes, file streaming and server-sent events
//! - **Structured logging**: JSON lines through `tracing`
//!
//! # Example
//!
//! ```rust,ignore
//! use pivot_core::Application;
//! use serde_json::json;
//!
//! let mut app = Application::new();
//! app.get("/users/:id", |req, res| {
//!     res.json(&json!({ "id": req.param("id") }));
//!     Ok(())
//! })?;
//! app.run()?;
//! ```

pub mod app;
pub mod config;
pub mod core;
pub mod events;
pub mod json;
pub mod logging;
pub mod message;
pub mod middleware;
pub mod pool;
pub mod router;
pub mod server;
pub mod time;
pub mod types;

pub use app::{Application, VERSION};
pub use config::Config;
pub use core::{Error, Request, Response, Result};
pub use server::Server;
