//! Ambient request environment.
//!
//! An [`Environment`] is the snapshot a host adapter captures once when a
//! request enters the process: method and target, protocol, headers, server
//! parameters, cookies, decoded form fields, uploaded files and the raw body.
//! Requests read from it; nothing reads process state mid-request.

use std::collections::BTreeMap;
use std::io::Read;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};

use super::request::parser::parse_cookies;
use super::Result;
use crate::types::{ParamList, UploadedFile};

/// HTTP version as static string (no allocation).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HttpVersion(&'static str);

impl HttpVersion {
    pub const HTTP_10: Self = Self("HTTP/1.0");
    pub const HTTP_11: Self = Self("HTTP/1.1");
    pub const HTTP_20: Self = Self("HTTP/2.0");

    /// Get the version string.
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        self.0
    }

    /// Version number without the `HTTP/` prefix ("1.1").
    #[inline]
    pub fn number(&self) -> &'static str {
        &self.0[5..]
    }

    /// Create from http::Version.
    #[inline]
    pub fn from_http(version: http::Version) -> Self {
        match version {
            http::Version::HTTP_10 => Self::HTTP_10,
            http::Version::HTTP_11 => Self::HTTP_11,
            http::Version::HTTP_2 => Self::HTTP_20,
            _ => Self::HTTP_11,
        }
    }

    /// Parse "HTTP/1.0", "1.0", "2", ... falling back to HTTP/1.1.
    pub fn parse(s: &str) -> Self {
        match s.trim().trim_start_matches("HTTP/") {
            "1.0" => Self::HTTP_10,
            "2" | "2.0" => Self::HTTP_20,
            _ => Self::HTTP_11,
        }
    }
}

impl std::fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

impl Default for HttpVersion {
    fn default() -> Self {
        Self::HTTP_11
    }
}

/// Server parameter names used by the request accessors.
pub mod server_keys {
    pub const REQUEST_METHOD: &str = "REQUEST_METHOD";
    pub const REQUEST_URI: &str = "REQUEST_URI";
    pub const QUERY_STRING: &str = "QUERY_STRING";
    pub const SERVER_PROTOCOL: &str = "SERVER_PROTOCOL";
    pub const REMOTE_ADDR: &str = "REMOTE_ADDR";
    pub const REMOTE_PORT: &str = "REMOTE_PORT";
    pub const HTTP_HOST: &str = "HTTP_HOST";
    pub const HTTPS: &str = "HTTPS";
    pub const SERVER_NAME: &str = "SERVER_NAME";
    pub const SERVER_PORT: &str = "SERVER_PORT";
    pub const REQUEST_TIME: &str = "REQUEST_TIME";
}

/// Snapshot of one inbound request as seen by the host.
#[derive(Clone, Debug)]
pub struct Environment {
    method: Method,
    target: String,
    version: HttpVersion,
    headers: HeaderMap,
    server: BTreeMap<String, String>,
    cookies: BTreeMap<String, String>,
    form: ParamList,
    files: BTreeMap<String, Vec<UploadedFile>>,
    body: Bytes,
}

impl Default for Environment {
    fn default() -> Self {
        EnvironmentBuilder::new().build()
    }
}

impl Environment {
    #[inline]
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::new()
    }

    /// Capture a CGI request from the process environment and stdin.
    pub fn from_cgi() -> Result<Self> {
        let vars: Vec<(String, String)> = std::env::vars().collect();
        let length = vars
            .iter()
            .find(|(k, _)| k == "CONTENT_LENGTH")
            .and_then(|(_, v)| v.trim().parse::<u64>().ok())
            .unwrap_or(0);

        let mut body = Vec::with_capacity(length.min(1 << 20) as usize);
        if length > 0 {
            std::io::stdin().take(length).read_to_end(&mut body)?;
        }

        Ok(Self::from_cgi_vars(vars, body))
    }

    /// Build from CGI meta-variables (`REQUEST_METHOD`, `HTTP_*`, ...).
    pub fn from_cgi_vars<I>(vars: I, body: impl Into<Bytes>) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut builder = EnvironmentBuilder::new();
        let mut request_uri = None;
        let mut script_name = String::new();
        let mut path_info = String::new();
        let mut query = String::new();

        for (key, value) in vars {
            match key.as_str() {
                "REQUEST_METHOD" => builder = builder.method(&value),
                "REQUEST_URI" => request_uri = Some(value.clone()),
                "SCRIPT_NAME" => script_name = value.clone(),
                "PATH_INFO" => path_info = value.clone(),
                "QUERY_STRING" => query = value.clone(),
                "SERVER_PROTOCOL" => builder = builder.version(HttpVersion::parse(&value)),
                "CONTENT_TYPE" => builder = builder.header("content-type", &value),
                "CONTENT_LENGTH" => builder = builder.header("content-length", &value),
                _ => {
                    if let Some(name) = key.strip_prefix("HTTP_") {
                        let name = name.to_ascii_lowercase().replace('_', "-");
                        builder = builder.header(&name, &value);
                    }
                }
            }
            builder = builder.server(key, value);
        }

        let target = request_uri.unwrap_or_else(|| {
            let mut target = format!("{}{}", script_name, path_info);
            if target.is_empty() {
                target.push('/');
            }
            if !query.is_empty() {
                target.push('?');
                target.push_str(&query);
            }
            target
        });

        builder.uri(target).body(body).build()
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Request target as sent by the client ("/path?query").
    #[inline]
    pub fn target(&self) -> &str {
        &self.target
    }

    /// Path portion of the request target.
    pub fn path(&self) -> &str {
        match self.target.find('?') {
            Some(pos) => &self.target[..pos],
            None => &self.target,
        }
    }

    /// Raw query string: `QUERY_STRING` when present, else the target's query.
    pub fn query_string(&self) -> &str {
        if let Some(qs) = self.server.get(server_keys::QUERY_STRING) {
            return qs;
        }
        match self.target.find('?') {
            Some(pos) => &self.target[pos + 1..],
            None => "",
        }
    }

    #[inline]
    pub fn version(&self) -> HttpVersion {
        self.version
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn server_params(&self) -> &BTreeMap<String, String> {
        &self.server
    }

    /// Single server parameter, `None` when missing or empty.
    pub fn server(&self, key: &str) -> Option<&str> {
        self.server
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    #[inline]
    pub fn cookies(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    /// Form fields already decoded by the host (urlencoded or multipart).
    #[inline]
    pub fn form(&self) -> &ParamList {
        &self.form
    }

    #[inline]
    pub fn files(&self) -> &BTreeMap<String, Vec<UploadedFile>> {
        &self.files
    }

    #[inline]
    pub fn body(&self) -> &Bytes {
        &self.body
    }
}

/// Builder for [`Environment`].
#[derive(Debug)]
pub struct EnvironmentBuilder {
    method: Method,
    target: String,
    version: HttpVersion,
    headers: HeaderMap,
    server: BTreeMap<String, String>,
    cookies: BTreeMap<String, String>,
    form: ParamList,
    files: BTreeMap<String, Vec<UploadedFile>>,
    body: Bytes,
}

impl EnvironmentBuilder {
    pub fn new() -> Self {
        Self {
            method: Method::GET,
            target: "/".to_string(),
            version: HttpVersion::HTTP_11,
            headers: HeaderMap::new(),
            server: BTreeMap::new(),
            cookies: BTreeMap::new(),
            form: Vec::new(),
            files: BTreeMap::new(),
            body: Bytes::new(),
        }
    }

    /// Set the method; unknown tokens are kept as extension methods.
    pub fn method(mut self, method: &str) -> Self {
        match Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes()) {
            Ok(m) => self.method = m,
            Err(_) => tracing::debug!(method = method, "ignoring invalid request method"),
        }
        self
    }

    /// Set the request target ("/path?query").
    pub fn uri(mut self, target: impl Into<String>) -> Self {
        let target = target.into();
        self.target = if target.is_empty() { "/".to_string() } else { target };
        self
    }

    pub fn version(mut self, version: HttpVersion) -> Self {
        self.version = version;
        self
    }

    /// Append a header. Invalid names or values are skipped.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.append(name, value);
        }
        self
    }

    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    pub fn server(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.server.insert(key.into(), value.into());
        self
    }

    /// Set `REMOTE_ADDR`.
    pub fn remote_addr(self, addr: impl Into<String>) -> Self {
        self.server(server_keys::REMOTE_ADDR, addr)
    }

    pub fn cookie(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.cookies.insert(name.into(), value.into());
        self
    }

    pub fn form_field(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((name.into(), value.into()));
        self
    }

    pub fn file(mut self, field: impl Into<String>, file: UploadedFile) -> Self {
        self.files.entry(field.into()).or_default().push(file);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Finish, deriving the standard server parameters that were not set.
    pub fn build(mut self) -> Environment {
        let query = self
            .target
            .find('?')
            .map(|pos| self.target[pos + 1..].to_string())
            .unwrap_or_default();

        self.server
            .entry(server_keys::REQUEST_METHOD.to_string())
            .or_insert_with(|| self.method.as_str().to_string());
        self.server
            .entry(server_keys::REQUEST_URI.to_string())
            .or_insert_with(|| self.target.clone());
        self.server
            .entry(server_keys::QUERY_STRING.to_string())
            .or_insert(query);
        self.server
            .entry(server_keys::SERVER_PROTOCOL.to_string())
            .or_insert_with(|| self.version.as_str().to_string());

        if let Some(host) = self.headers.get(http::header::HOST).and_then(|v| v.to_str().ok()) {
            self.server
                .entry(server_keys::HTTP_HOST.to_string())
                .or_insert_with(|| host.to_string());
        }

        if self.cookies.is_empty() {
            for value in self.headers.get_all(http::header::COOKIE) {
                if let Ok(header) = value.to_str() {
                    self.cookies.extend(parse_cookies(header));
                }
            }
        }

        Environment {
            method: self.method,
            target: self.target,
            version: self.version,
            headers: self.headers,
            server: self.server,
            cookies: self.cookies,
            form: self.form,
            files: self.files,
            body: self.body,
        }
    }
}

impl Default for EnvironmentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_derives_server_params() {
        let env = Environment::builder()
            .method("post")
            .uri("/users?page=2")
            .header("Host", "example.com")
            .header("Cookie", "session=abc; theme=dark")
            .remote_addr("10.0.0.1")
            .build();

        assert_eq!(env.method(), &Method::POST);
        assert_eq!(env.path(), "/users");
        assert_eq!(env.query_string(), "page=2");
        assert_eq!(env.server("REQUEST_METHOD"), Some("POST"));
        assert_eq!(env.server("REQUEST_URI"), Some("/users?page=2"));
        assert_eq!(env.server("HTTP_HOST"), Some("example.com"));
        assert_eq!(env.server("REMOTE_ADDR"), Some("10.0.0.1"));
        assert_eq!(env.cookies().get("theme").map(String::as_str), Some("dark"));
    }

    #[test]
    fn test_default_environment() {
        let env = Environment::default();
        assert_eq!(env.method(), &Method::GET);
        assert_eq!(env.target(), "/");
        assert_eq!(env.query_string(), "");
        assert!(env.body().is_empty());
        assert_eq!(env.server("QUERY_STRING"), None);
    }

    #[test]
    fn test_from_cgi_vars() {
        let vars = vec![
            ("REQUEST_METHOD".to_string(), "PUT".to_string()),
            ("SCRIPT_NAME".to_string(), "/index".to_string()),
            ("PATH_INFO".to_string(), "/items/3".to_string()),
            ("QUERY_STRING".to_string(), "x=1".to_string()),
            ("SERVER_PROTOCOL".to_string(), "HTTP/1.0".to_string()),
            ("CONTENT_TYPE".to_string(), "application/json".to_string()),
            ("HTTP_X_REQUESTED_WITH".to_string(), "XMLHttpRequest".to_string()),
        ];
        let env = Environment::from_cgi_vars(vars, "{}");

        assert_eq!(env.method(), &Method::PUT);
        assert_eq!(env.target(), "/index/items/3?x=1");
        assert_eq!(env.version(), HttpVersion::HTTP_10);
        assert_eq!(
            env.headers().get("x-requested-with").unwrap(),
            "XMLHttpRequest"
        );
        assert_eq!(env.headers().get("content-type").unwrap(), "application/json");
        assert_eq!(env.body().as_ref(), b"{}");
    }

    #[test]
    fn test_http_version() {
        assert_eq!(HttpVersion::HTTP_11.number(), "1.1");
        assert_eq!(HttpVersion::parse("HTTP/2.0"), HttpVersion::HTTP_20);
        assert_eq!(HttpVersion::parse("1.0"), HttpVersion::HTTP_10);
        assert_eq!(HttpVersion::parse("garbage"), HttpVersion::HTTP_11);
        assert_eq!(HttpVersion::from_http(http::Version::HTTP_2), HttpVersion::HTTP_20);
        assert_eq!(format!("{}", HttpVersion::HTTP_20), "HTTP/2.0");
    }
}
