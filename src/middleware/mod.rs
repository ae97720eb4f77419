//! Middleware pipeline for request/response processing.
//!
//! Middleware wrap the route handler in onion order: each layer gets the
//! request, the response and a [`Next`] continuation. Calling `next.run`
//! hands control to the following layer (and finally the handler); code
//! before the call runs outer-to-inner, code after it inner-to-outer. A
//! layer that returns without calling `next` short-circuits the chain, and a
//! layer can wrap the call to turn downstream errors into a response.
//!
//! # Example
//!
//! ```rust,ignore
//! use pivot_core::middleware::{Middleware, MiddlewareStack, Next};
//! use pivot_core::core::{Request, Response, Result};
//!
//! struct RequireToken;
//!
//! impl Middleware for RequireToken {
//!     fn name(&self) -> &str { "require_token" }
//!
//!     fn handle(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<()> {
//!         if req.header("authorization").is_none() {
//!             res.error(401, "");
//!             return Ok(());
//!         }
//!         next.run(req, res)
//!     }
//! }
//!
//! let mut stack = MiddlewareStack::new();
//! stack.add(RequireToken);
//! ```

mod stack;

pub mod access_log;

pub use access_log::AccessLogMiddleware;
pub use stack::MiddlewareStack;

use std::sync::Arc;

use crate::core::{Request, Response, Result};

/// Innermost callable of a chain, normally the matched route handler.
pub type Terminal<'a> = dyn Fn(&mut Request, &mut Response) -> Result<()> + 'a;

/// One layer of the pipeline.
pub trait Middleware: Send + Sync {
    /// Name used in logs and introspection.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Process the request, calling `next.run(req, res)` to continue.
    fn handle(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<()>;
}

/// Continuation to the rest of the chain.
pub struct Next<'a> {
    rest: &'a [Arc<dyn Middleware>],
    terminal: &'a Terminal<'a>,
}

impl<'a> Next<'a> {
    pub(crate) fn new(rest: &'a [Arc<dyn Middleware>], terminal: &'a Terminal<'a>) -> Self {
        Self { rest, terminal }
    }

    /// Number of layers still ahead of the terminal.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.rest.len()
    }

    /// Invoke the next layer, or the terminal when none are left.
    pub fn run(self, req: &mut Request, res: &mut Response) -> Result<()> {
        match self.rest.split_first() {
            Some((layer, rest)) => {
                tracing::trace!(middleware = layer.name(), "entering middleware");
                layer.handle(req, res, Next::new(rest, self.terminal))
            }
            None => (self.terminal)(req, res),
        }
    }
}

/// Adapter turning a closure into a [`Middleware`].
pub struct FnMiddleware<F> {
    name: String,
    f: F,
}

impl<F> FnMiddleware<F>
where
    F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn handle(&self, req: &mut Request, res: &mut Response, next: Next<'_>) -> Result<()> {
        (self.f)(req, res, next)
    }
}
