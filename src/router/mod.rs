//! Route registration and lookup.
//!
//! A [`Router`] is owned by the application. Routes are registered at boot
//! and matched in registration order; a `HEAD` request falls back to the
//! `GET` route for the same path.

mod handler;

pub use handler::{CallableResolver, Controller, Handler, HandlerFn};

use http::Method;
use serde_json::{Map, Value};

use crate::core::{Request, Response, Result, RoutePattern};

/// One registered route.
#[derive(Clone, Debug)]
pub struct Route {
    /// `None` matches every method.
    method: Option<Method>,
    pattern: RoutePattern,
    handler: Handler,
}

impl Route {
    /// Method name, `ANY` for catch-all routes.
    pub fn method(&self) -> &str {
        self.method.as_ref().map_or("ANY", Method::as_str)
    }

    #[inline]
    pub fn path(&self) -> &str {
        self.pattern.as_str()
    }

    #[inline]
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    #[inline]
    pub fn handler(&self) -> &Handler {
        &self.handler
    }

    fn accepts(&self, method: &Method) -> bool {
        self.method.as_ref().is_none_or(|m| m == method)
    }
}

/// A successful lookup.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub pattern: &'a RoutePattern,
    pub handler: &'a Handler,
    pub params: Map<String, Value>,
}

/// Registered routes.
#[derive(Clone, Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
    prefix: String,
}

macro_rules! method_routes {
    ($($name:ident => $method:ident),* $(,)?) => {
        $(
            #[doc = concat!("Register a `", stringify!($method), "` route.")]
            pub fn $name<F>(&mut self, path: &str, f: F) -> Result<&mut Self>
            where
                F: Fn(&mut Request, &mut Response) -> Result<()> + Send + Sync + 'static,
            {
                self.add(Some(Method::$method), path, Handler::function(f))
            }
        )*
    };
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    method_routes! {
        get => GET,
        post => POST,
        put => PUT,
        patch => PATCH,
        delete => DELETE,
        options => OPTIONS,
        head => HEAD,
    }

    /// Register a closure for every method.
    pub fn any<F>(&mut self, path: &str, f: F) -> Result<&mut Self>
    where
        F: Fn(&mut Request, &mut Response) -> Result<()> + Send + Sync + 'static,
    {
        self.add(None, path, Handler::function(f))
    }

    /// Register any handler descriptor; `method: None` matches all methods.
    pub fn add(&mut self, method: Option<Method>, path: &str, handler: Handler) -> Result<&mut Self> {
        let full = join_paths(&self.prefix, path);
        let pattern = RoutePattern::compile(&full)?;
        tracing::debug!(
            method = method.as_ref().map_or("ANY", Method::as_str),
            path = %full,
            handler = handler.kind(),
            "registered route"
        );
        self.routes.push(Route {
            method,
            pattern,
            handler,
        });
        Ok(self)
    }

    /// Register the routes added inside `f` under `prefix`.
    pub fn group<F>(&mut self, prefix: &str, f: F) -> Result<&mut Self>
    where
        F: FnOnce(&mut Router) -> Result<()>,
    {
        let outer = std::mem::take(&mut self.prefix);
        self.prefix = join_paths(&outer, prefix);
        let result = f(self);
        self.prefix = outer;
        result.map(|_| self)
    }

    /// All routes in registration order.
    #[inline]
    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First route matching `method` and the concrete `path`.
    pub fn find(&self, method: &str, path: &str) -> Option<RouteMatch<'_>> {
        let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes()).ok()?;
        self.find_method(&method, path).or_else(|| {
            (method == Method::HEAD)
                .then(|| self.find_method(&Method::GET, path))
                .flatten()
        })
    }

    fn find_method(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.routes
            .iter()
            .filter(|route| route.accepts(method))
            .filter(|route| route.pattern.is_match(path))
            .find_map(|route| {
                let params = route.pattern.params(path).ok()?;
                Some(RouteMatch {
                    pattern: &route.pattern,
                    handler: &route.handler,
                    params,
                })
            })
    }

    /// `"METHOD path"` for the first `limit` routes.
    pub fn summaries(&self, limit: usize) -> Vec<String> {
        self.routes
            .iter()
            .take(limit)
            .map(|route| format!("{} {}", route.method(), route.path()))
            .collect()
    }
}

fn join_paths(prefix: &str, path: &str) -> String {
    let prefix = prefix.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return if prefix.is_empty() {
            "/".to_string()
        } else {
            prefix.to_string()
        };
    }
    format!("{}/{}", prefix, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(_: &mut Request, _: &mut Response) -> Result<()> {
        Ok(())
    }

    #[test]
    fn test_find_with_params() {
        let mut router = Router::new();
        router.get("/users/:id/posts/:postId", ok).unwrap();

        let found = router.find("GET", "/users/42/posts/7").unwrap();
        assert_eq!(found.pattern.as_str(), "/users/:id/posts/:postId");
        assert_eq!(found.params["id"], json!(42));
        assert_eq!(found.params["postId"], json!(7));

        assert!(router.find("POST", "/users/42/posts/7").is_none());
        assert!(router.find("GET", "/users/42").is_none());
    }

    #[test]
    fn test_trailing_slash_and_constraints() {
        let mut router = Router::new();
        router.get("/items/:id<\\d+>", ok).unwrap();

        assert!(router.find("GET", "/items/5/").is_some());
        assert!(router.find("GET", "/items/abc").is_none());
    }

    #[test]
    fn test_static_route_misses_other_paths() {
        let mut router = Router::new();
        router.get("/", ok).unwrap().get("/health", ok).unwrap();

        assert!(router.find("GET", "/does-not-exist").is_none());
        assert!(router.find("GET", "/health/extra").is_none());
        assert_eq!(router.find("GET", "/health").unwrap().pattern.as_str(), "/health");
        assert_eq!(router.find("GET", "/").unwrap().pattern.as_str(), "/");
    }

    #[test]
    fn test_head_falls_back_to_get() {
        let mut router = Router::new();
        router.get("/ping", ok).unwrap();
        assert!(router.find("HEAD", "/ping").is_some());
        assert!(router.find("head", "/ping").is_some());
    }

    #[test]
    fn test_any_and_registration_order() {
        let mut router = Router::new();
        router.any("/x", ok).unwrap().post("/x", ok).unwrap();

        let found = router.find("POST", "/x").unwrap();
        assert!(std::ptr::eq(found.pattern, router.routes()[0].pattern()));
        assert_eq!(router.routes()[0].method(), "ANY");
    }

    #[test]
    fn test_groups_prefix_paths() {
        let mut router = Router::new();
        router
            .group("/api", |r| {
                r.get("/", ok)?;
                r.group("v1/", |r| {
                    r.get("/users", ok)?;
                    Ok(())
                })?;
                Ok(())
            })
            .unwrap();
        router.get("/health", ok).unwrap();

        let paths: Vec<_> = router.routes().iter().map(Route::path).collect();
        assert_eq!(paths, vec!["/api", "/api/v1/users", "/health"]);
        assert_eq!(router.summaries(2), vec!["GET /api", "GET /api/v1/users"]);
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let mut router = Router::new();
        assert!(router.get("/bad/:id<[>", ok).is_err());
        assert!(router.is_empty());
    }
}
