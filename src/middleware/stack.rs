//! Ordered middleware stack.

use std::sync::Arc;

use super::{FnMiddleware, Middleware, Next, Terminal};
use crate::core::{Request, Response, Result};

/// Middleware in registration order.
///
/// Built at boot and shared read-only across requests afterwards.
#[derive(Clone, Default)]
pub struct MiddlewareStack {
    layers: Vec<Arc<dyn Middleware>>,
}

impl MiddlewareStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a middleware object.
    pub fn add<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.layers.push(Arc::new(middleware));
        self
    }

    /// Append a shared middleware.
    pub fn add_arc(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        self.layers.push(middleware);
        self
    }

    /// Append a closure of shape `(req, res, next)`.
    pub fn add_fn<F>(&mut self, name: impl Into<String>, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.add(FnMiddleware::new(name, f))
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Middleware names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.layers.iter().map(|m| m.name()).collect()
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }

    /// Run the stack around `terminal`, starting at the first layer.
    ///
    /// Errors not handled by a layer propagate out of this call.
    pub fn execute(
        &self,
        req: &mut Request,
        res: &mut Response,
        terminal: &Terminal<'_>,
    ) -> Result<()> {
        tracing::debug!(layers = self.layers.len(), "executing middleware stack");
        Next::new(&self.layers, terminal).run(req, res)
    }
}

impl std::fmt::Debug for MiddlewareStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
