//! The application: boot, registration and the per-request dispatch loop.
//!
//! One dispatch cycle serves one request to completion:
//!
//! 1. boot on first use (pool settings, alias middleware, `ApplicationStarted`)
//! 2. `RequestReceived`
//! 3. route lookup, a miss raising a route-not-found error with suggestions
//! 4. the matched pattern is applied to the request so parameters reflect it
//! 5. the middleware stack runs around the resolved handler
//! 6. any escaped error (or panic) becomes an error response, once
//! 7. `ResponseSent` with the elapsed time
//!
//! # Example
//!
//! ```rust,ignore
//! use pivot_core::app::Application;
//!
//! let mut app = Application::new();
//! app.get("/users/:id", |req, res| {
//!     res.json(&serde_json::json!({"id": req.param("id")}));
//!     Ok(())
//! })?;
//! app.run()?;
//! ```

mod errors;

pub use errors::{error_payload, log_exception, new_error_id};

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::time::{Instant, SystemTime};

use http::Method;

use crate::config::{Config, ConfigError};
use crate::core::{Environment, Error, OutputSink, Request, Response, Result, StdoutOutput};
use crate::events::{Event, EventDispatcher, EventKind, Listeners};
use crate::json::{JsonEncoder, PooledJsonEncoder};
use crate::middleware::{AccessLogMiddleware, FnMiddleware, Middleware, MiddlewareStack, Next};
use crate::pool::Psr7Pool;
use crate::router::{CallableResolver, Controller, Handler, Router};

/// Framework version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds a middleware for an alias.
pub type MiddlewareFactory = dyn Fn(&Config) -> Arc<dyn Middleware> + Send + Sync;

/// Maximum route suggestions attached to a not-found error.
const MAX_SUGGESTIONS: usize = 10;

/// Routes, middleware and collaborators for serving requests.
pub struct Application {
    config: Config,
    router: Router,
    middleware: MiddlewareStack,
    /// Stack frozen at boot: registered middleware plus configured aliases.
    booted: OnceLock<MiddlewareStack>,
    aliases: HashMap<String, Arc<MiddlewareFactory>>,
    resolver: CallableResolver,
    listeners: Listeners,
    dispatcher: Option<Arc<dyn EventDispatcher>>,
    pool: Arc<Psr7Pool>,
    encoder: Arc<dyn JsonEncoder>,
    output: Arc<dyn OutputSink>,
    started_at: SystemTime,
}

macro_rules! route_methods {
    ($($name:ident),* $(,)?) => {
        $(
            #[doc = concat!("Register a route through [`Router::", stringify!($name), "`].")]
            pub fn $name<F>(&mut self, path: &str, f: F) -> Result<&mut Self>
            where
                F: Fn(&mut Request, &mut Response) -> Result<()> + Send + Sync + 'static,
            {
                self.router.$name(path, f)?;
                Ok(self)
            }
        )*
    };
}

impl Application {
    /// Application with default configuration.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Application configured from environment variables.
    pub fn from_env() -> std::result::Result<Self, ConfigError> {
        Ok(Self::with_config(Config::from_env()?))
    }

    pub fn with_config(config: Config) -> Self {
        let pool = Arc::new(Psr7Pool::new(config.pool.max_size));
        let encoder: Arc<dyn JsonEncoder> = Arc::new(PooledJsonEncoder::new(Arc::clone(&pool)));

        let mut aliases: HashMap<String, Arc<MiddlewareFactory>> = HashMap::new();
        aliases.insert(
            "access_log".to_string(),
            Arc::new(|_: &Config| Arc::new(AccessLogMiddleware::new()) as Arc<dyn Middleware>),
        );

        Self {
            config,
            router: Router::new(),
            middleware: MiddlewareStack::new(),
            booted: OnceLock::new(),
            aliases,
            resolver: CallableResolver::new(),
            listeners: Listeners::new(),
            dispatcher: None,
            pool,
            encoder,
            output: Arc::new(StdoutOutput::new()),
            started_at: SystemTime::now(),
        }
    }

    // Configuration

    /// Adjust configuration before boot.
    pub fn configure<F: FnOnce(&mut Config)>(&mut self, f: F) -> &mut Self {
        if self.is_booted() {
            tracing::warn!("configuration changed after boot; pool and middleware settings already applied");
        }
        f(&mut self.config);
        self
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn version(&self) -> &'static str {
        VERSION
    }

    #[inline]
    pub fn pool(&self) -> &Arc<Psr7Pool> {
        &self.pool
    }

    /// Replace the encoder used for large JSON payloads.
    pub fn set_json_encoder(&mut self, encoder: Arc<dyn JsonEncoder>) -> &mut Self {
        self.encoder = encoder;
        self
    }

    /// Sink used by [`handle`](Self::handle) (default: stdout).
    pub fn set_output(&mut self, output: Arc<dyn OutputSink>) -> &mut Self {
        self.output = output;
        self
    }

    // Middleware

    /// Append a middleware object.
    pub fn use_middleware<M: Middleware + 'static>(&mut self, middleware: M) -> &mut Self {
        self.push_middleware(Arc::new(middleware))
    }

    /// Append a closure middleware of shape `(req, res, next)`.
    pub fn use_fn<F>(&mut self, name: &str, f: F) -> &mut Self
    where
        F: Fn(&mut Request, &mut Response, Next<'_>) -> Result<()> + Send + Sync + 'static,
    {
        self.push_middleware(Arc::new(FnMiddleware::new(name, f)))
    }

    /// Append the middleware registered under `alias`.
    pub fn use_alias(&mut self, alias: &str) -> Result<&mut Self> {
        let factory = self
            .aliases
            .get(alias)
            .cloned()
            .ok_or_else(|| Error::invalid_argument(format!("Unknown middleware alias: {}", alias)))?;
        let middleware = factory(&self.config);
        Ok(self.push_middleware(middleware))
    }

    /// Register a middleware alias usable from `use_alias` and `APP_MIDDLEWARE`.
    pub fn middleware_alias<F>(&mut self, alias: &str, factory: F) -> &mut Self
    where
        F: Fn(&Config) -> Arc<dyn Middleware> + Send + Sync + 'static,
    {
        self.aliases.insert(alias.to_string(), Arc::new(factory));
        self
    }

    fn push_middleware(&mut self, middleware: Arc<dyn Middleware>) -> &mut Self {
        if let Some(stack) = self.booted.get_mut() {
            tracing::warn!(middleware = middleware.name(), "middleware added after boot");
            stack.add_arc(Arc::clone(&middleware));
        }
        self.middleware.add_arc(middleware);
        self
    }

    /// Middleware names in execution order.
    pub fn middleware_names(&self) -> Vec<&str> {
        match self.booted.get() {
            Some(stack) => stack.names(),
            None => self.middleware.names(),
        }
    }

    // Routes

    route_methods!(get, post, put, patch, delete, options, head, any);

    /// Register any handler descriptor; `method: None` matches all methods.
    pub fn route(&mut self, method: Option<Method>, path: &str, handler: Handler) -> Result<&mut Self> {
        self.router.add(method, path, handler)?;
        Ok(self)
    }

    /// Register routes under a path prefix.
    pub fn group<F>(&mut self, prefix: &str, f: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut Router) -> Result<()>,
    {
        self.router.group(prefix, f)?;
        Ok(self)
    }

    /// Register a controller for [`Handler::class`] routes.
    pub fn register_controller(&mut self, name: &str, controller: Arc<dyn Controller>) -> &mut Self {
        self.resolver.register(name, controller);
        self
    }

    #[inline]
    pub fn router(&self) -> &Router {
        &self.router
    }

    #[inline]
    pub fn router_mut(&mut self) -> &mut Router {
        &mut self.router
    }

    // Events

    /// Register an event listener.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> &Self
    where
        F: Fn(&Event<'_>) + Send + Sync + 'static,
    {
        self.listeners.on(kind, listener);
        self
    }

    pub fn clear_event_listeners(&self) {
        self.listeners.clear();
    }

    /// External dispatcher receiving every event after local listeners.
    pub fn set_event_dispatcher(&mut self, dispatcher: Arc<dyn EventDispatcher>) -> &mut Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    fn publish(&self, event: &Event<'_>) {
        self.listeners.dispatch(event);
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.dispatch(event);
        }
    }

    // Lifecycle

    #[inline]
    pub fn is_booted(&self) -> bool {
        self.booted.get().is_some()
    }

    /// Apply configuration and freeze the middleware stack. Runs once.
    pub fn boot(&self) -> &Self {
        self.stack();
        self
    }

    fn stack(&self) -> &MiddlewareStack {
        self.booted.get_or_init(|| {
            let objects = self.pool.objects();
            objects.set_capacity(self.config.pool.max_size);
            if self.config.pool.enabled {
                objects.enable();
            } else {
                objects.disable();
            }

            let mut stack = self.middleware.clone();
            for alias in &self.config.app.middleware {
                match self.aliases.get(alias) {
                    Some(factory) => {
                        stack.add_arc(factory(&self.config));
                    }
                    None => tracing::warn!(alias = %alias, "unknown middleware alias, skipping"),
                }
            }

            tracing::debug!(
                app = %self.config.app.name,
                routes = self.router.len(),
                middleware = stack.len(),
                "application booted"
            );
            self.publish(&Event::ApplicationStarted {
                started_at: self.started_at,
                config: &self.config,
            });
            stack
        })
    }

    /// Fresh response wired to this application's pool and encoder.
    pub fn new_response(&self, output: Arc<dyn OutputSink>) -> Response {
        Response::builder()
            .output(output)
            .pool(Arc::clone(&self.pool))
            .encoder(Arc::clone(&self.encoder))
            .stream_buffer_size(self.config.app.stream_buffer_size)
            .json_threshold(self.config.app.json_pool_threshold)
            .build()
    }

    /// Request from a host snapshot, using this application's pool.
    pub fn request_from(&self, env: Environment) -> Result<Request> {
        let method = env.method().as_str().to_string();
        let path = env.path().to_string();
        Request::builder(&method, &path, &path)
            .environment(env)
            .pool(Arc::clone(&self.pool))
            .build()
    }

    /// Serve `request` (or the CGI request of this process) without emitting.
    pub fn handle(&self, request: Option<Request>) -> Response {
        match request {
            Some(request) => self.dispatch(request, Arc::clone(&self.output)),
            None => match Environment::from_cgi() {
                Ok(env) => self.dispatch_environment(env, Arc::clone(&self.output)),
                Err(err) => self.failed_response(&err, Arc::clone(&self.output)),
            },
        }
    }

    /// Build the request for `env` and dispatch it. A request that cannot be
    /// built is answered with the matching error response.
    pub fn dispatch_environment(&self, env: Environment, output: Arc<dyn OutputSink>) -> Response {
        match self.request_from(env) {
            Ok(request) => self.dispatch(request, output),
            Err(err) => self.failed_response(&err, output),
        }
    }

    fn failed_response(&self, err: &Error, output: Arc<dyn OutputSink>) -> Response {
        self.stack();
        let mut response = self.new_response(output);
        self.handle_exception(err, &mut response);
        response
    }

    /// Run one dispatch cycle with responses emitted through `output`.
    pub fn dispatch(&self, mut request: Request, output: Arc<dyn OutputSink>) -> Response {
        let stack = self.stack();
        let started = Instant::now();
        let mut response = self.new_response(output);

        self.publish(&Event::RequestReceived {
            request: &request,
            timestamp: SystemTime::now(),
        });

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.route_request(stack, &mut request, &mut response)
        }));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(Error::internal(format!(
                "Handler panicked: {}",
                errors::panic_message(payload)
            ))),
        };
        if let Err(err) = result {
            self.handle_exception(&err, &mut response);
        }

        self.publish(&Event::ResponseSent {
            request: &request,
            response: &response,
            timestamp: SystemTime::now(),
            duration: started.elapsed(),
        });
        response
    }

    fn route_request(&self, stack: &MiddlewareStack, req: &mut Request, res: &mut Response) -> Result<()> {
        let found = self
            .router
            .find(req.method(), req.path_callable())
            .ok_or_else(|| {
                Error::route_not_found(
                    req.method(),
                    req.path_callable(),
                    self.router.summaries(MAX_SUGGESTIONS),
                )
            })?;
        tracing::debug!(
            method = req.method(),
            path = req.path_callable(),
            pattern = found.pattern.as_str(),
            "route matched"
        );

        req.apply_pattern(found.pattern)?;
        let handler = found.handler;
        stack.execute(req, res, &|req, res| self.resolver.call(handler, req, res))
    }

    /// Log `err` and turn `response` into its error payload.
    pub fn handle_exception(&self, err: &Error, response: &mut Response) {
        let error_id = new_error_id();
        log_exception(err, &error_id);

        let payload = error_payload(err, self.config.app.debug, &error_id);
        response.status(err.status().as_u16()).json(&payload);
    }

    /// Serve this process's CGI request and emit the response to stdout.
    pub fn run(&self) -> Result<()> {
        let mut response = self.handle(None);
        if response.is_sent() {
            return Ok(());
        }
        response.emit(true)
    }
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("name", &self.config.app.name)
            .field("booted", &self.is_booted())
            .field("routes", &self.router.len())
            .field("middleware", &self.middleware_names())
            .finish_non_exhaustive()
    }
}
