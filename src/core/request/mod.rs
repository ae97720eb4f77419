//! Hybrid HTTP request.
//!
//! A [`Request`] is a mutable convenience object (route parameters, query,
//! parsed body, attributes) with an immutable [`ServerRequest`] snapshot
//! behind the message-style accessors. The snapshot is rented from the
//! [`Psr7Pool`] on first use, dropped whenever in-place setters change
//! state, never carried into `with_*` copies, and handed back to the pool
//! when the request goes away.

mod ip;
pub mod parser;
pub mod path;

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock, OnceLock};

use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, Method};
use serde_json::{Map, Value};

use super::environment::server_keys;
use super::{AttributeValue, Attributes, Environment, Error, HttpVersion, Result};
use crate::message::{ServerRequest, ServerRequestParts, Stream, Uri};
use crate::pool::Psr7Pool;
use crate::types::UploadedFile;

pub use path::RoutePattern;

static X_REQUESTED_WITH: LazyLock<HeaderName> =
    LazyLock::new(|| HeaderName::from_static("x-requested-with"));
static X_FORWARDED_PROTO: LazyLock<HeaderName> =
    LazyLock::new(|| HeaderName::from_static("x-forwarded-proto"));
static X_FORWARDED_SSL: LazyLock<HeaderName> =
    LazyLock::new(|| HeaderName::from_static("x-forwarded-ssl"));

/// Names that can never be used as attributes.
pub const RESERVED_NAMES: &[&str] = &[
    "method",
    "path",
    "path_callable",
    "params",
    "query",
    "body",
    "headers",
    "files",
    "attributes",
    "psr7_request",
];

/// Whether `name` is one of the request's own fields.
#[inline]
pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

/// One inbound HTTP call.
pub struct Request {
    method: Method,
    pattern: String,
    path_callable: String,
    params: Map<String, Value>,
    query: Map<String, Value>,
    body: Value,
    target: String,
    request_target: Option<String>,
    version: HttpVersion,
    headers: HeaderMap,
    cookies: BTreeMap<String, String>,
    files: BTreeMap<String, Vec<UploadedFile>>,
    raw_body: Bytes,
    attributes: Attributes,
    env: Arc<Environment>,
    pool: Arc<Psr7Pool>,
    snapshot: OnceLock<Box<ServerRequest>>,
}

impl Request {
    /// Request for `method` on `path`, matched against route `pattern`.
    ///
    /// `path` may carry a query string. Fails when the pattern declares more
    /// placeholders than the path provides.
    pub fn new(method: &str, pattern: &str, path: &str) -> Result<Self> {
        RequestBuilder::new(method, pattern, path).build()
    }

    pub fn builder(method: &str, pattern: &str, path: &str) -> RequestBuilder {
        RequestBuilder::new(method, pattern, path)
    }

    /// Request straight from a host snapshot, using its path as the pattern.
    pub fn from_environment(env: Environment) -> Result<Self> {
        let method = env.method().as_str().to_string();
        let path = env.path().to_string();
        RequestBuilder::new(&method, &path, &path)
            .environment(env)
            .build()
    }

    /// Uppercase method name.
    #[inline]
    pub fn method(&self) -> &str {
        self.method.as_str()
    }

    /// Route pattern the parameters were parsed against.
    #[inline]
    pub fn route_pattern(&self) -> &str {
        &self.pattern
    }

    /// Concrete request path.
    #[inline]
    pub fn path_callable(&self) -> &str {
        &self.path_callable
    }

    /// Replace the route pattern and re-derive parameters from the known path.
    pub fn set_path(&mut self, pattern: &str) -> Result<&mut Self> {
        if pattern.is_empty() {
            return Err(Error::invalid_argument("Path cannot be empty"));
        }
        let mut pattern = pattern.to_string();
        if !pattern.ends_with('/') {
            pattern.push('/');
        }
        let compiled = RoutePattern::compile(&pattern)?;
        self.apply_pattern(&compiled)
    }

    /// Re-derive parameters from an already compiled pattern.
    pub fn apply_pattern(&mut self, pattern: &RoutePattern) -> Result<&mut Self> {
        self.params = pattern.params(&self.path_callable)?;
        self.pattern = pattern.as_str().to_string();
        self.invalidate();
        Ok(self)
    }

    #[inline]
    pub fn params(&self) -> &Map<String, Value> {
        &self.params
    }

    /// Route parameter (integers already coerced).
    #[inline]
    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    #[inline]
    pub fn query(&self) -> &Map<String, Value> {
        &self.query
    }

    /// Query string value.
    #[inline]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.query.get(key)
    }

    /// Parsed body, always an object.
    #[inline]
    pub fn inputs(&self) -> &Value {
        &self.body
    }

    /// Field of the parsed body.
    #[inline]
    pub fn input(&self, key: &str) -> Option<&Value> {
        self.body.get(key)
    }

    #[inline]
    pub fn files(&self) -> &BTreeMap<String, Vec<UploadedFile>> {
        &self.files
    }

    /// First file uploaded under `key`.
    pub fn file(&self, key: &str) -> Option<&UploadedFile> {
        self.files.get(key).and_then(|files| files.first())
    }

    /// Whether `key` holds a successfully uploaded file.
    pub fn has_file(&self, key: &str) -> bool {
        self.file(key).is_some_and(UploadedFile::is_ok)
    }

    /// Header value as text.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[inline]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(String::as_str)
    }

    pub fn user_agent(&self) -> &str {
        self.header(header::USER_AGENT.as_str()).unwrap_or("")
    }

    /// Client address, honouring proxy headers that carry a public IP.
    pub fn ip(&self) -> String {
        ip::client_ip(&self.headers, self.env.server(server_keys::REMOTE_ADDR))
    }

    pub fn is_ajax(&self) -> bool {
        self.headers
            .get(&*X_REQUESTED_WITH)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("xmlhttprequest"))
    }

    pub fn is_secure(&self) -> bool {
        let https = self
            .env
            .server(server_keys::HTTPS)
            .is_some_and(|v| !v.eq_ignore_ascii_case("off"));
        let proto = self
            .headers
            .get(&*X_FORWARDED_PROTO)
            .is_some_and(|v| v == "https");
        let ssl = self
            .headers
            .get(&*X_FORWARDED_SSL)
            .is_some_and(|v| v == "on");
        https || proto || ssl
    }

    /// `scheme://host/request-uri` as the client addressed it.
    pub fn full_url(&self) -> String {
        let scheme = if self.is_secure() { "https" } else { "http" };
        let host = self
            .env
            .server(server_keys::HTTP_HOST)
            .or_else(|| self.header(header::HOST.as_str()))
            .unwrap_or("localhost");
        let uri = self.env.server(server_keys::REQUEST_URI).unwrap_or("/");
        format!("{scheme}://{host}{uri}")
    }

    /// Whether the Accept header admits `mime` (exact, `type/*` or `*/*`).
    pub fn accepts(&self, mime: &str) -> bool {
        let Some(accept) = self.header(header::ACCEPT.as_str()) else {
            return true;
        };
        let major = mime.split('/').next().unwrap_or("");
        accept.split(',').any(|item| {
            let range = item.split(';').next().unwrap_or("").trim();
            range == "*/*"
                || range.eq_ignore_ascii_case(mime)
                || range
                    .strip_suffix("/*")
                    .is_some_and(|m| m.eq_ignore_ascii_case(major))
        })
    }

    pub fn is_json(&self) -> bool {
        self.header(header::CONTENT_TYPE.as_str())
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("json"))
    }

    /// Store an attribute. Reserved names are rejected.
    pub fn set_attribute<T>(&mut self, name: &str, value: T) -> Result<&mut Self>
    where
        T: std::any::Any + Send + Sync,
    {
        check_attribute_name(name, "override")?;
        self.attributes.set(name, value);
        self.invalidate();
        Ok(self)
    }

    /// Store an already shared attribute value.
    pub fn set_shared_attribute(&mut self, name: &str, value: AttributeValue) -> Result<&mut Self> {
        check_attribute_name(name, "override")?;
        self.attributes.set_shared(name, value);
        self.invalidate();
        Ok(self)
    }

    /// Typed attribute from the mutable store.
    #[inline]
    pub fn get_attribute<T: 'static>(&self, name: &str) -> Option<&T> {
        self.attributes.get(name)
    }

    #[inline]
    pub fn has_attribute(&self, name: &str) -> bool {
        self.attributes.contains(name)
    }

    pub fn remove_attribute(&mut self, name: &str) -> Result<&mut Self> {
        check_attribute_name(name, "unset")?;
        if self.attributes.remove(name).is_some() {
            self.invalidate();
        }
        Ok(self)
    }

    /// The immutable snapshot, built on first access.
    pub fn message(&self) -> &ServerRequest {
        self.snapshot
            .get_or_init(|| self.pool.server_request(self.snapshot_parts()))
    }

    /// Whether the snapshot currently exists.
    #[inline]
    pub fn has_snapshot(&self) -> bool {
        self.snapshot.get().is_some()
    }

    #[inline]
    pub fn pool(&self) -> &Arc<Psr7Pool> {
        &self.pool
    }

    #[inline]
    pub fn environment(&self) -> &Environment {
        &self.env
    }

    // Message-style accessors, all served from the snapshot.

    #[inline]
    pub fn method_str(&self) -> &str {
        self.message().method().as_str()
    }

    #[inline]
    pub fn uri(&self) -> &Uri {
        self.message().uri()
    }

    #[inline]
    pub fn request_target(&self) -> &str {
        self.message().request_target()
    }

    #[inline]
    pub fn protocol_version(&self) -> &'static str {
        self.message().protocol_version()
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        self.message().headers()
    }

    #[inline]
    pub fn has_header(&self, name: &str) -> bool {
        self.message().has_header(name)
    }

    #[inline]
    pub fn header_values(&self, name: &str) -> Vec<&str> {
        self.message().header(name)
    }

    #[inline]
    pub fn header_line(&self, name: &str) -> String {
        self.message().header_line(name)
    }

    #[inline]
    pub fn body(&self) -> &Stream {
        self.message().body()
    }

    #[inline]
    pub fn server_params(&self) -> &BTreeMap<String, String> {
        self.message().server_params()
    }

    #[inline]
    pub fn cookie_params(&self) -> &BTreeMap<String, String> {
        self.message().cookie_params()
    }

    #[inline]
    pub fn query_params(&self) -> &Map<String, Value> {
        self.message().query_params()
    }

    #[inline]
    pub fn uploaded_files(&self) -> &BTreeMap<String, Vec<UploadedFile>> {
        self.message().uploaded_files()
    }

    #[inline]
    pub fn parsed_body(&self) -> &Value {
        self.message().parsed_body()
    }

    /// Attributes as the snapshot sees them, route parameters included.
    #[inline]
    pub fn attributes(&self) -> &Attributes {
        self.message().attributes()
    }

    #[inline]
    pub fn attribute<T: 'static>(&self, name: &str) -> Option<&T> {
        self.message().attribute(name)
    }

    // Copy-on-write mutators. Each returns a new request whose snapshot is
    // unbuilt; `self` is left untouched.

    pub fn with_method(&self, method: &str) -> Result<Self> {
        let mut next = self.fork();
        next.method = parse_method(method)?;
        Ok(next)
    }

    pub fn with_uri(&self, uri: &str) -> Self {
        let mut next = self.fork();
        next.target = if uri.is_empty() { "/".to_string() } else { uri.to_string() };
        next
    }

    pub fn with_request_target(&self, target: &str) -> Self {
        let mut next = self.fork();
        next.request_target = Some(target.to_string());
        next
    }

    pub fn with_protocol_version(&self, version: &str) -> Self {
        let mut next = self.fork();
        next.version = HttpVersion::parse(version);
        next
    }

    /// Replace all values of a header.
    pub fn with_header(&self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = header_pair(name, value)?;
        let mut next = self.fork();
        next.headers.insert(name, value);
        Ok(next)
    }

    /// Append a value to a header.
    pub fn with_added_header(&self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = header_pair(name, value)?;
        let mut next = self.fork();
        next.headers.append(name, value);
        Ok(next)
    }

    pub fn without_header(&self, name: &str) -> Self {
        let mut next = self.fork();
        next.headers.remove(name);
        next
    }

    pub fn with_body(&self, body: impl Into<Bytes>) -> Self {
        let mut next = self.fork();
        next.raw_body = body.into();
        next
    }

    pub fn with_attribute<T>(&self, name: &str, value: T) -> Result<Self>
    where
        T: std::any::Any + Send + Sync,
    {
        check_attribute_name(name, "override")?;
        let mut next = self.fork();
        next.attributes.set(name, value);
        Ok(next)
    }

    pub fn without_attribute(&self, name: &str) -> Result<Self> {
        check_attribute_name(name, "unset")?;
        let mut next = self.fork();
        next.attributes.remove(name);
        Ok(next)
    }

    /// New request with `query` as both the query map and snapshot query.
    pub fn with_query_params(&self, query: Map<String, Value>) -> Self {
        let mut next = self.fork();
        next.query = query;
        next
    }

    pub fn with_cookie_params(&self, cookies: BTreeMap<String, String>) -> Self {
        let mut next = self.fork();
        next.cookies = cookies;
        next
    }

    pub fn with_uploaded_files(&self, files: BTreeMap<String, Vec<UploadedFile>>) -> Self {
        let mut next = self.fork();
        next.files = files;
        next
    }

    pub fn with_parsed_body(&self, body: Value) -> Self {
        let mut next = self.fork();
        next.body = body;
        next
    }

    /// Field-for-field copy without the snapshot.
    fn fork(&self) -> Self {
        Self {
            method: self.method.clone(),
            pattern: self.pattern.clone(),
            path_callable: self.path_callable.clone(),
            params: self.params.clone(),
            query: self.query.clone(),
            body: self.body.clone(),
            target: self.target.clone(),
            request_target: self.request_target.clone(),
            version: self.version,
            headers: self.headers.clone(),
            cookies: self.cookies.clone(),
            files: self.files.clone(),
            raw_body: self.raw_body.clone(),
            attributes: self.attributes.clone(),
            env: Arc::clone(&self.env),
            pool: Arc::clone(&self.pool),
            snapshot: OnceLock::new(),
        }
    }

    /// Drop the snapshot so the next message access rebuilds it.
    fn invalidate(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.pool.release_server_request(snapshot);
        }
    }

    fn snapshot_parts(&self) -> ServerRequestParts {
        let mut attributes = self.attributes.clone();
        for (name, value) in &self.params {
            if !attributes.contains(name) {
                attributes.set(name.clone(), value.clone());
            }
        }

        ServerRequestParts {
            method: self.method.clone(),
            target: self.target.clone(),
            request_target: self.request_target.clone(),
            version: self.version,
            headers: self.headers.clone(),
            body: self.raw_body.to_vec(),
            server: self.env.server_params().clone(),
            cookies: self.cookies.clone(),
            query: self.query.clone(),
            parsed_body: self.body.clone(),
            files: self.files.clone(),
            attributes,
        }
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        self.invalidate();
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("method", &self.method)
            .field("pattern", &self.pattern)
            .field("path", &self.path_callable)
            .field("params", &self.params)
            .field("attributes", &self.attributes)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Request`].
pub struct RequestBuilder {
    method: String,
    pattern: String,
    path: String,
    env: Option<Environment>,
    pool: Option<Arc<Psr7Pool>>,
}

impl RequestBuilder {
    pub fn new(method: &str, pattern: &str, path: &str) -> Self {
        Self {
            method: method.to_string(),
            pattern: pattern.to_string(),
            path: path.to_string(),
            env: None,
            pool: None,
        }
    }

    /// Host snapshot to read headers, server params, cookies and body from.
    pub fn environment(mut self, env: Environment) -> Self {
        self.env = Some(env);
        self
    }

    /// Pool for the message snapshot (default: the shared pool).
    pub fn pool(mut self, pool: Arc<Psr7Pool>) -> Self {
        self.pool = Some(pool);
        self
    }

    pub fn build(self) -> Result<Request> {
        let method = parse_method(&self.method)?;

        let (path_callable, inline_query) = match self.path.split_once('?') {
            Some((path, query)) => (path.to_string(), Some(query.to_string())),
            None => (self.path.clone(), None),
        };

        let env = match self.env {
            Some(env) => env,
            None => Environment::builder()
                .method(method.as_str())
                .uri(self.path.clone())
                .build(),
        };

        let query_string = match &inline_query {
            Some(query) => query.as_str(),
            None => env.query_string(),
        };
        let query = parser::parse_query_string(query_string);

        let target = if query_string.is_empty() {
            path_callable.clone()
        } else {
            format!("{path_callable}?{query_string}")
        };

        let compiled = RoutePattern::compile(&self.pattern)?;
        let params = compiled.params(&path_callable)?;
        let body = parse_body(&method, &env);

        Ok(Request {
            method,
            pattern: self.pattern,
            path_callable,
            params,
            query,
            body,
            target,
            request_target: None,
            version: env.version(),
            headers: env.headers().clone(),
            cookies: env.cookies().clone(),
            files: env.files().clone(),
            raw_body: env.body().clone(),
            attributes: Attributes::new(),
            env: Arc::new(env),
            pool: self.pool.unwrap_or_else(Psr7Pool::shared),
            snapshot: OnceLock::new(),
        })
    }
}

fn parse_method(method: &str) -> Result<Method> {
    Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| Error::invalid_argument(format!("Invalid HTTP method: {method}")))
}

fn header_pair(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| Error::invalid_argument(format!("Invalid header name: {name}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|_| Error::invalid_argument(format!("Invalid header value for {name}")))?;
    Ok((name, value))
}

fn check_attribute_name(name: &str, action: &str) -> Result<()> {
    if is_reserved(name) {
        return Err(Error::invalid_argument(format!(
            "Cannot {action} native property: {name}"
        )));
    }
    Ok(())
}

/// Body rules: nothing for GET/HEAD/OPTIONS/DELETE, a JSON object when the
/// body is one, otherwise host form fields or a urlencoded parse.
fn parse_body(method: &Method, env: &Environment) -> Value {
    if matches!(
        *method,
        Method::GET | Method::HEAD | Method::OPTIONS | Method::DELETE
    ) {
        return Value::Object(Map::new());
    }

    match serde_json::from_slice::<Value>(env.body()) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(_) => Value::Object(Map::new()),
        Err(_) if !env.form().is_empty() => Value::Object(parser::pairs_to_map(
            env.form().iter().map(|(k, v)| (k.as_str(), v.as_str())),
        )),
        Err(_) => {
            let raw = String::from_utf8_lossy(env.body());
            Value::Object(parser::parse_query_string(&raw))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ErrorKind;
    use crate::pool::kinds;
    use serde_json::json;

    fn pooled() -> Arc<Psr7Pool> {
        Arc::new(Psr7Pool::new(8))
    }

    #[test]
    fn test_route_params() {
        let req = Request::new("get", "/users/:id/posts/:postId", "/users/42/posts/7").unwrap();
        assert_eq!(req.method(), "GET");
        assert_eq!(req.param("id"), Some(&json!(42)));
        assert_eq!(req.param("postId"), Some(&json!(7)));
        assert_eq!(req.param("missing"), None);
    }

    #[test]
    fn test_param_count_mismatch() {
        let err = Request::new("GET", "/users/:id/:extra", "/users/42").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_query_from_path_and_environment() {
        let req = Request::new("GET", "/search", "/search?q=rust+lang&tags[]=a&tags[]=b").unwrap();
        assert_eq!(req.path_callable(), "/search");
        assert_eq!(req.get("q"), Some(&json!("rust lang")));
        assert_eq!(req.get("tags"), Some(&json!(["a", "b"])));

        let env = Environment::builder().uri("/list?page=3").build();
        let req = Request::builder("GET", "/list", "/list")
            .environment(env)
            .build()
            .unwrap();
        assert_eq!(req.get("page"), Some(&json!("3")));
        assert_eq!(req.uri().query(), Some("page=3"));
    }

    #[test]
    fn test_json_body() {
        let env = Environment::builder()
            .method("POST")
            .uri("/users")
            .header("content-type", "application/json")
            .body(r#"{"name":"Ana","age":30}"#)
            .build();
        let req = Request::from_environment(env).unwrap();
        assert_eq!(req.input("name"), Some(&json!("Ana")));
        assert_eq!(req.input("age"), Some(&json!(30)));
        assert!(req.is_json());
    }

    #[test]
    fn test_body_fallbacks() {
        let env = Environment::builder().method("POST").body("[1,2,3]").build();
        let req = Request::from_environment(env).unwrap();
        assert_eq!(req.inputs(), &json!({}));

        let env = Environment::builder()
            .method("POST")
            .form_field("title", "from host")
            .body("not json")
            .build();
        let req = Request::from_environment(env).unwrap();
        assert_eq!(req.input("title"), Some(&json!("from host")));

        let env = Environment::builder().method("PUT").body("a=1&b=two+words").build();
        let req = Request::from_environment(env).unwrap();
        assert_eq!(req.input("b"), Some(&json!("two words")));

        let env = Environment::builder().method("DELETE").body(r#"{"x":1}"#).build();
        let req = Request::from_environment(env).unwrap();
        assert_eq!(req.inputs(), &json!({}));
    }

    #[test]
    fn test_set_path_reparses() {
        let mut req = Request::new("GET", "/items/42", "/items/42").unwrap();
        assert!(req.params().is_empty());

        req.set_path("/items/:id").unwrap();
        assert_eq!(req.route_pattern(), "/items/:id/");
        assert_eq!(req.param("id"), Some(&json!(42)));

        let err = req.set_path("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_reserved_attribute_names() {
        let mut req = Request::new("GET", "/", "/").unwrap();
        for name in RESERVED_NAMES {
            assert!(req.set_attribute(name, 1u8).is_err());
            assert!(req.remove_attribute(name).is_err());
        }
        assert!(req.with_attribute("headers", "x").is_err());
        assert!(!req.has_attribute("headers"));

        req.set_attribute("user_id", 7u32).unwrap();
        assert_eq!(req.get_attribute::<u32>("user_id"), Some(&7));
        req.remove_attribute("user_id").unwrap();
        assert!(!req.has_attribute("user_id"));
    }

    #[test]
    fn test_snapshot_is_lazy_and_invalidated() {
        let pool = pooled();
        let mut req = Request::builder("GET", "/a/:id", "/a/5")
            .pool(Arc::clone(&pool))
            .build()
            .unwrap();
        assert!(!req.has_snapshot());

        assert_eq!(req.uri().path(), "/a/5");
        assert!(req.has_snapshot());
        assert_eq!(req.attribute::<Value>("id"), Some(&json!(5)));

        req.set_attribute("role", "admin".to_string()).unwrap();
        assert!(!req.has_snapshot());
        assert_eq!(pool.objects().size(kinds::REQUEST), 1);
        assert_eq!(req.attribute::<String>("role").map(String::as_str), Some("admin"));
    }

    #[test]
    fn test_drop_returns_snapshot_to_pool() {
        let pool = pooled();
        {
            let req = Request::builder("GET", "/", "/")
                .pool(Arc::clone(&pool))
                .build()
                .unwrap();
            let _ = req.headers();
        }
        assert_eq!(pool.objects().size(kinds::REQUEST), 1);
    }

    #[test]
    fn test_with_mutators_honor_arguments() {
        let req = Request::new("GET", "/", "/?a=1").unwrap();
        let _ = req.query_params();

        let mut query = Map::new();
        query.insert("b".into(), json!("2"));
        let next = req.with_query_params(query);
        assert!(!next.has_snapshot());
        assert_eq!(next.query_params().get("b"), Some(&json!("2")));
        assert!(next.query_params().get("a").is_none());
        assert_eq!(req.query_params().get("a"), Some(&json!("1")));

        let mut cookies = BTreeMap::new();
        cookies.insert("sid".to_string(), "xyz".to_string());
        let next = req.with_cookie_params(cookies);
        assert_eq!(next.cookie_params().get("sid").map(String::as_str), Some("xyz"));

        let next = req.with_parsed_body(json!({"k": true}));
        assert_eq!(next.parsed_body(), &json!({"k": true}));

        let file = UploadedFile {
            name: "a.txt".into(),
            mime_type: "text/plain".into(),
            tmp_name: "/tmp/x".into(),
            size: 3,
            error: 0,
        };
        let mut files = BTreeMap::new();
        files.insert("doc".to_string(), vec![file]);
        let next = req.with_uploaded_files(files);
        assert!(next.has_file("doc"));
        assert_eq!(next.uploaded_files()["doc"][0].name, "a.txt");
    }

    #[test]
    fn test_with_message_mutators() {
        let req = Request::new("GET", "/", "/").unwrap();
        let next = req
            .with_method("patch")
            .unwrap()
            .with_header("X-Trace", "abc")
            .unwrap()
            .with_added_header("x-trace", "def")
            .unwrap()
            .with_protocol_version("2.0")
            .with_request_target("*")
            .with_uri("/other?x=1")
            .with_body("payload");

        assert_eq!(next.method(), "PATCH");
        assert_eq!(next.header_values("x-trace"), vec!["abc", "def"]);
        assert_eq!(next.header_line("x-trace"), "abc, def");
        assert_eq!(next.protocol_version(), "2.0");
        assert_eq!(next.request_target(), "*");
        assert_eq!(next.uri().path(), "/other");
        assert_eq!(next.body().contents(), b"payload");

        let stripped = next.without_header("x-trace");
        assert!(!stripped.has_header("x-trace"));
        assert!(req.with_header("bad header", "v").is_err());
        assert!(req.with_method("BAD METHOD").is_err());
    }

    #[test]
    fn test_client_accessors() {
        let env = Environment::builder()
            .uri("/page?x=1")
            .header("host", "example.com")
            .header("x-forwarded-for", "8.8.8.8, 10.0.0.1")
            .header("x-forwarded-proto", "https")
            .header("x-requested-with", "XMLHttpRequest")
            .header("accept", "text/html, application/*;q=0.8")
            .header("user-agent", "test-agent")
            .remote_addr("10.0.0.1")
            .build();
        let req = Request::from_environment(env).unwrap();

        assert_eq!(req.ip(), "8.8.8.8");
        assert!(req.is_secure());
        assert!(req.is_ajax());
        assert_eq!(req.full_url(), "https://example.com/page?x=1");
        assert!(req.accepts("application/json"));
        assert!(!req.accepts("image/png"));
        assert_eq!(req.user_agent(), "test-agent");
    }

    #[test]
    fn test_ip_falls_back_to_remote_addr() {
        let env = Environment::builder()
            .header("x-forwarded-for", "192.168.1.5")
            .remote_addr("10.1.1.1")
            .build();
        let req = Request::from_environment(env).unwrap();
        assert_eq!(req.ip(), "10.1.1.1");

        let req = Request::new("GET", "/", "/").unwrap();
        assert_eq!(req.ip(), "0.0.0.0");
        assert_eq!(req.full_url(), "http://localhost/");
    }
}
