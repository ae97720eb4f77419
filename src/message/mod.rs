//! Immutable HTTP message snapshots.
//!
//! These are the value types behind the message-style accessors of the
//! hybrid [`Request`](crate::core::Request) and
//! [`Response`](crate::core::Response). They are built on demand from the
//! mutable objects (through the [`Psr7Pool`](crate::pool::Psr7Pool)), never
//! mutated by callers, and recycled when the owner drops them.

mod stream;
mod uri;

pub use stream::Stream;
pub use uri::Uri;

use std::collections::BTreeMap;

use http::{HeaderMap, Method, StatusCode};
use serde_json::{Map, Value};

use crate::core::{Attributes, HttpVersion};
use crate::types::UploadedFile;

/// Owned inputs for a [`ServerRequest`] snapshot.
#[derive(Debug, Default)]
pub struct ServerRequestParts {
    pub method: Method,
    pub target: String,
    pub request_target: Option<String>,
    pub version: HttpVersion,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
    pub server: BTreeMap<String, String>,
    pub cookies: BTreeMap<String, String>,
    pub query: Map<String, Value>,
    pub parsed_body: Value,
    pub files: BTreeMap<String, Vec<UploadedFile>>,
    pub attributes: Attributes,
}

/// Immutable server-side request message.
#[derive(Debug)]
pub struct ServerRequest {
    method: Method,
    uri: Box<Uri>,
    request_target: Option<String>,
    version: HttpVersion,
    headers: HeaderMap,
    body: Box<Stream>,
    server: BTreeMap<String, String>,
    cookies: BTreeMap<String, String>,
    query: Map<String, Value>,
    parsed_body: Value,
    files: BTreeMap<String, Vec<UploadedFile>>,
    attributes: Attributes,
}

impl ServerRequest {
    /// Assemble from parts around an already allocated uri and body.
    pub(crate) fn assemble(uri: Box<Uri>, body: Box<Stream>, parts: ServerRequestParts) -> Self {
        Self {
            method: parts.method,
            uri,
            request_target: parts.request_target,
            version: parts.version,
            headers: parts.headers,
            body,
            server: parts.server,
            cookies: parts.cookies,
            query: parts.query,
            parsed_body: parts.parsed_body,
            files: parts.files,
            attributes: parts.attributes,
        }
    }

    /// Refill a recycled snapshot, reusing its uri and body allocations.
    pub(crate) fn refill(&mut self, parts: ServerRequestParts) {
        self.uri.reset(&parts.target);
        self.body.reset(&parts.body);
        self.method = parts.method;
        self.request_target = parts.request_target;
        self.version = parts.version;
        self.headers = parts.headers;
        self.server = parts.server;
        self.cookies = parts.cookies;
        self.query = parts.query;
        self.parsed_body = parts.parsed_body;
        self.files = parts.files;
        self.attributes = parts.attributes;
    }

    #[inline]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[inline]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request target: explicit override, else path and query of the uri.
    pub fn request_target(&self) -> &str {
        match &self.request_target {
            Some(target) => target,
            None => self.uri.path_and_query(),
        }
    }

    /// Protocol version number ("1.1").
    #[inline]
    pub fn protocol_version(&self) -> &'static str {
        self.version.number()
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    /// All values of a header (empty when absent).
    pub fn header(&self, name: &str) -> Vec<&str> {
        header_values(&self.headers, name)
    }

    /// Values of a header joined with ", ".
    pub fn header_line(&self, name: &str) -> String {
        self.header(name).join(", ")
    }

    #[inline]
    pub fn body(&self) -> &Stream {
        &self.body
    }

    #[inline]
    pub fn server_params(&self) -> &BTreeMap<String, String> {
        &self.server
    }

    #[inline]
    pub fn cookie_params(&self) -> &BTreeMap<String, String> {
        &self.cookies
    }

    #[inline]
    pub fn query_params(&self) -> &Map<String, Value> {
        &self.query
    }

    #[inline]
    pub fn parsed_body(&self) -> &Value {
        &self.parsed_body
    }

    #[inline]
    pub fn uploaded_files(&self) -> &BTreeMap<String, Vec<UploadedFile>> {
        &self.files
    }

    #[inline]
    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    #[inline]
    pub fn attribute<T: 'static>(&self, name: &str) -> Option<&T> {
        self.attributes.get(name)
    }
}

/// Immutable response message.
#[derive(Debug)]
pub struct ResponseMessage {
    status: StatusCode,
    reason: Option<String>,
    version: HttpVersion,
    headers: HeaderMap,
    body: Box<Stream>,
}

impl ResponseMessage {
    pub(crate) fn assemble(
        status: StatusCode,
        reason: Option<String>,
        version: HttpVersion,
        headers: HeaderMap,
        body: Box<Stream>,
    ) -> Self {
        Self {
            status,
            reason,
            version,
            headers,
            body,
        }
    }

    pub(crate) fn refill(
        &mut self,
        status: StatusCode,
        reason: Option<String>,
        version: HttpVersion,
        headers: HeaderMap,
        body: &[u8],
    ) {
        self.status = status;
        self.reason = reason;
        self.version = version;
        self.headers = headers;
        self.body.reset(body);
    }

    #[inline]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Custom reason phrase, else the canonical one.
    pub fn reason_phrase(&self) -> &str {
        match &self.reason {
            Some(reason) => reason,
            None => self.status.canonical_reason().unwrap_or(""),
        }
    }

    #[inline]
    pub fn protocol_version(&self) -> &'static str {
        self.version.number()
    }

    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[inline]
    pub fn has_header(&self, name: &str) -> bool {
        self.headers.contains_key(name)
    }

    pub fn header(&self, name: &str) -> Vec<&str> {
        header_values(&self.headers, name)
    }

    pub fn header_line(&self, name: &str) -> String {
        self.header(name).join(", ")
    }

    #[inline]
    pub fn body(&self) -> &Stream {
        &self.body
    }
}

pub(crate) fn header_values<'a>(headers: &'a HeaderMap, name: &str) -> Vec<&'a str> {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect()
}
