//! Route handler descriptors and their resolution.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::core::{Error, Request, Response, Result};

/// Plain handler function.
pub type HandlerFn = dyn Fn(&mut Request, &mut Response) -> Result<()> + Send + Sync;

/// An object exposing named handler methods.
pub trait Controller: Send + Sync {
    /// Name used in diagnostics.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Invoke `method`. `None` means the controller has no such method.
    fn call(&self, method: &str, req: &mut Request, res: &mut Response) -> Option<Result<()>>;
}

/// What a route invokes.
#[derive(Clone)]
pub enum Handler {
    /// A function or closure.
    Function(Arc<HandlerFn>),
    /// A method on a controller instance.
    Method {
        controller: Arc<dyn Controller>,
        method: String,
    },
    /// A method on a controller registered by name, looked up per call.
    Class { class: String, method: String },
}

impl Handler {
    pub fn function<F>(f: F) -> Self
    where
        F: Fn(&mut Request, &mut Response) -> Result<()> + Send + Sync + 'static,
    {
        Handler::Function(Arc::new(f))
    }

    pub fn method(controller: Arc<dyn Controller>, method: impl Into<String>) -> Self {
        Handler::Method {
            controller,
            method: method.into(),
        }
    }

    pub fn class(class: impl Into<String>, method: impl Into<String>) -> Self {
        Handler::Class {
            class: class.into(),
            method: method.into(),
        }
    }

    /// Descriptor shape: `function`, `method` or `class`.
    pub fn kind(&self) -> &'static str {
        match self {
            Handler::Function(_) => "function",
            Handler::Method { .. } => "method",
            Handler::Class { .. } => "class",
        }
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Function(_) => f.write_str("Function(..)"),
            Handler::Method { controller, method } => {
                write!(f, "Method({}::{})", controller.name(), method)
            }
            Handler::Class { class, method } => write!(f, "Class({}::{})", class, method),
        }
    }
}

/// Invokes handlers, resolving [`Handler::Class`] against registered
/// controllers.
#[derive(Clone, Default)]
pub struct CallableResolver {
    controllers: BTreeMap<String, Arc<dyn Controller>>,
}

impl CallableResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, controller: Arc<dyn Controller>) {
        self.controllers.insert(name.into(), controller);
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.controllers.contains_key(name)
    }

    /// Call `handler`, failing with an invalid-handler error when it cannot
    /// be resolved.
    pub fn call(&self, handler: &Handler, req: &mut Request, res: &mut Response) -> Result<()> {
        match handler {
            Handler::Function(f) => f(req, res),
            Handler::Method { controller, method } => controller
                .call(method, req, res)
                .unwrap_or_else(|| {
                    Err(Error::invalid_handler(
                        "method",
                        controller.name(),
                        method.as_str(),
                        "Method does not exist on controller",
                    ))
                }),
            Handler::Class { class, method } => {
                let controller = self.controllers.get(class).ok_or_else(|| {
                    Error::invalid_handler(
                        "class",
                        class.as_str(),
                        method.as_str(),
                        "Controller is not registered",
                    )
                })?;
                controller.call(method, req, res).unwrap_or_else(|| {
                    Err(Error::invalid_handler(
                        "class",
                        class.as_str(),
                        method.as_str(),
                        "Method does not exist on controller",
                    ))
                })
            }
        }
    }
}

impl fmt::Debug for CallableResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.controllers.keys()).finish()
    }
}
