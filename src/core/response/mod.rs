//! Hybrid HTTP response.
//!
//! [`Response`] is mutated in place by handlers and middleware (`status`,
//! `header`, `json`, `send`, streaming writers) and emits itself through an
//! [`OutputSink`]. Message-style accessors read a lazily built
//! [`ResponseMessage`] snapshot rented from the [`Psr7Pool`]; `with_*` calls
//! return an independent copy with no snapshot.
//!
//! Test mode (on under `cfg(test)` or with `PIVOT_TEST_MODE` set) keeps every
//! byte away from the sink: streaming writes accumulate in the body instead,
//! and `emit` only updates the bookkeeping.

pub mod cookie;
pub mod output;
pub mod sse;

use std::fs::File;
use std::io::{ErrorKind as IoErrorKind, Read};
use std::path::Path;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use http::header::{self, HeaderName, HeaderValue};
use http::{HeaderMap, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};

use super::{Data, Error, HttpVersion, Result};
use crate::json::{self, DirectEncoder, JsonEncoder, DEFAULT_POOL_THRESHOLD};
use crate::message::{ResponseMessage, Stream};
use crate::pool::Psr7Pool;

pub use cookie::{CookieOptions, SameSite};
pub use output::{BufferedOutput, OutputSink, StdoutOutput};
pub use sse::EventFields;

/// Default chunk size for file and reader streaming.
pub const DEFAULT_STREAM_BUFFER_SIZE: usize = 8192;

/// Environment variable that forces test mode.
pub const TEST_MODE_ENV: &str = "PIVOT_TEST_MODE";

mod content_types {
    use super::HeaderValue;

    pub static JSON: HeaderValue = HeaderValue::from_static("application/json; charset=utf-8");
    pub static TEXT: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");
    pub static HTML: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");
    pub static EVENT_STREAM: HeaderValue = HeaderValue::from_static("text/event-stream");
    pub static NO_CACHE: HeaderValue = HeaderValue::from_static("no-cache");
    pub static KEEP_ALIVE: HeaderValue = HeaderValue::from_static("keep-alive");
    pub static BYTES: HeaderValue = HeaderValue::from_static("bytes");
}

/// Whether responses built without an explicit flag run in test mode.
pub fn detect_test_mode() -> bool {
    cfg!(test)
        || std::env::var_os(TEST_MODE_ENV)
            .is_some_and(|v| !v.is_empty() && v != "0" && v != "false")
}

/// Default message for [`Response::error`].
pub fn default_error_message(code: u16) -> &'static str {
    match code {
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "Error",
    }
}

/// The outbound HTTP result being assembled.
pub struct Response {
    status: StatusCode,
    reason: Option<String>,
    version: HttpVersion,
    headers: HeaderMap,
    body: Vec<u8>,
    streaming: bool,
    stream_buffer_size: usize,
    test_mode: bool,
    auto_emit: bool,
    sent: bool,
    output: Arc<dyn OutputSink>,
    encoder: Arc<dyn JsonEncoder>,
    json_threshold: usize,
    pool: Arc<Psr7Pool>,
    snapshot: OnceLock<Box<ResponseMessage>>,
}

impl Response {
    /// Empty 200 response writing to stdout, test mode auto-detected.
    pub fn new() -> Self {
        ResponseBuilder::new().build()
    }

    pub fn builder() -> ResponseBuilder {
        ResponseBuilder::new()
    }

    // Accessors

    #[inline]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    #[inline]
    pub fn status_value(&self) -> StatusCode {
        self.status
    }

    /// Mutable header map (last write wins per name, `Set-Cookie` appends).
    #[inline]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Body bytes buffered so far.
    #[inline]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn body_string(&self) -> String {
        json::sanitize_bytes(&self.body)
    }

    #[inline]
    pub fn is_sent(&self) -> bool {
        self.sent
    }

    #[inline]
    pub fn is_streaming(&self) -> bool {
        self.streaming
    }

    #[inline]
    pub fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    #[inline]
    pub fn auto_emit_enabled(&self) -> bool {
        self.auto_emit
    }

    #[inline]
    pub fn stream_buffer_size(&self) -> usize {
        self.stream_buffer_size
    }

    #[inline]
    pub fn output(&self) -> &Arc<dyn OutputSink> {
        &self.output
    }

    // Convenience mutators

    pub fn set_test_mode(&mut self, test_mode: bool) -> &mut Self {
        self.test_mode = test_mode;
        self
    }

    /// Turn automatic emission after body setters off (or back on).
    pub fn disable_auto_emit(&mut self, disable: bool) -> &mut Self {
        self.auto_emit = !disable;
        self
    }

    /// Chunk size for `stream_file`/`stream_resource` (at least one byte).
    pub fn set_stream_buffer_size(&mut self, size: usize) -> &mut Self {
        self.stream_buffer_size = size.max(1);
        self
    }

    /// Set the status; invalid codes are ignored.
    pub fn status(&mut self, code: u16) -> &mut Self {
        match StatusCode::from_u16(code) {
            Ok(status) => {
                self.set_status(status);
            }
            Err(_) => tracing::warn!(code, "ignoring invalid status code"),
        }
        self
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = status;
        self.reason = None;
        self.invalidate();
        if self.live_head() {
            self.output.send_status(status);
        }
        self
    }

    /// Set a header, replacing previous values. Invalid names or values are
    /// skipped.
    pub fn header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> &mut Self {
        if let Some((name, value)) = header_pair(name.as_ref(), value.as_ref()) {
            self.put_header(name, value, true);
        }
        self
    }

    /// Add a header value without replacing existing ones.
    pub fn append_header(&mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> &mut Self {
        if let Some((name, value)) = header_pair(name.as_ref(), value.as_ref()) {
            self.put_header(name, value, false);
        }
        self
    }

    pub fn remove_header(&mut self, name: &str) -> &mut Self {
        if self.headers.remove(name).is_some() {
            self.invalidate();
        }
        self
    }

    fn put_header(&mut self, name: HeaderName, value: HeaderValue, replace: bool) {
        if self.live_head() {
            self.output.send_header(&name, &value, replace);
        }
        if replace {
            self.headers.insert(name, value);
        } else {
            self.headers.append(name, value);
        }
        self.invalidate();
    }

    /// JSON body with `application/json; charset=utf-8`.
    ///
    /// Unserializable data degrades to `{}`; large payloads go through the
    /// configured encoder.
    pub fn json<T: Serialize + ?Sized>(&mut self, data: &T) -> &mut Self {
        let value = json::to_value_lossy(data);
        self.json_value(&value)
    }

    fn json_value(&mut self, value: &Value) -> &mut Self {
        self.put_header(header::CONTENT_TYPE, content_types::JSON.clone(), true);
        let encoded = json::encode(value, &*self.encoder, self.json_threshold);
        self.replace_body(encoded.into_bytes());
        self.auto_emit();
        self
    }

    /// Plain text body.
    pub fn text(&mut self, data: impl Into<Data>) -> &mut Self {
        let text = self.coerce_text(data.into());
        self.put_header(header::CONTENT_TYPE, content_types::TEXT.clone(), true);
        self.replace_body(text.into_bytes());
        self.auto_emit();
        self
    }

    /// HTML body.
    pub fn html(&mut self, data: impl Into<Data>) -> &mut Self {
        let html = self.coerce_text(data.into());
        self.put_header(header::CONTENT_TYPE, content_types::HTML.clone(), true);
        self.replace_body(html.into_bytes());
        self.auto_emit();
        self
    }

    /// Pick a body helper from the payload type: structures as JSON, readers
    /// streamed, text containing a tag as HTML, anything else as text.
    pub fn send(&mut self, data: impl Into<Data>) -> &mut Self {
        match data.into() {
            Data::Structured(value) => self.json_value(&value),
            Data::Reader(reader) => {
                if let Err(e) = self.stream_resource(reader, None) {
                    tracing::warn!(error = %e, "streaming response body failed");
                }
                self
            }
            Data::Number(n) => self.text(n.to_string()),
            data if data.looks_like_html() => self.html(data),
            data => self.text(data),
        }
    }

    /// Status plus `Location`.
    pub fn redirect(&mut self, url: &str, code: u16) -> &mut Self {
        self.status(code);
        self.header(header::LOCATION, url)
    }

    /// Append a `Set-Cookie` header.
    pub fn cookie(&mut self, name: &str, value: &str, options: CookieOptions) -> &mut Self {
        let rendered = cookie::render(name, value, &options);
        self.append_header(header::SET_COOKIE, rendered)
    }

    /// Append an expired `Set-Cookie` for `name`.
    pub fn clear_cookie(&mut self, name: &str, path: &str, domain: Option<&str>) -> &mut Self {
        let rendered = cookie::render_clear(name, path, domain);
        self.append_header(header::SET_COOKIE, rendered)
    }

    /// `{"error": message, "code": code}` with the status set.
    pub fn error(&mut self, code: u16, message: &str) -> &mut Self {
        self.status(code);
        let message = if message.is_empty() {
            default_error_message(code)
        } else {
            message
        };
        self.json_value(&json!({ "error": message, "code": code }))
    }

    /// `{"success": true, "message": message, "data": data}`; `data` omitted
    /// when null.
    pub fn success<T: Serialize + ?Sized>(&mut self, data: &T, message: &str) -> &mut Self {
        let data = json::to_value_lossy(data);
        let mut payload = json!({ "success": true, "message": message });
        if !data.is_null() {
            payload["data"] = data;
        }
        self.json_value(&payload)
    }

    // Streaming

    /// Enter streaming mode with no-cache and keep-alive headers.
    pub fn start_stream(&mut self, content_type: Option<&str>) -> &mut Self {
        self.streaming = true;
        self.put_header(header::CACHE_CONTROL, content_types::NO_CACHE.clone(), true);
        self.put_header(header::CONNECTION, content_types::KEEP_ALIVE.clone(), true);
        if let Some(content_type) = content_type {
            self.header(header::CONTENT_TYPE, content_type);
        }
        self
    }

    /// Write a chunk straight to the client, optionally flushing right away.
    pub fn write(&mut self, data: impl AsRef<[u8]>, flush: bool) -> Result<&mut Self> {
        let data = data.as_ref();
        if self.test_mode {
            self.body.extend_from_slice(data);
            self.invalidate();
            return Ok(self);
        }
        self.output.write_body(data)?;
        if flush {
            self.output.flush()?;
        }
        Ok(self)
    }

    /// Write a JSON chunk; `{}` when encoding fails.
    pub fn write_json<T: Serialize + ?Sized>(&mut self, data: &T, flush: bool) -> Result<&mut Self> {
        let encoded = json::encode_direct(data);
        self.write(encoded, flush)
    }

    /// Stream a file in `stream_buffer_size` chunks with its MIME type,
    /// `Content-Length` and `Accept-Ranges: bytes`.
    pub fn stream_file(
        &mut self,
        path: impl AsRef<Path>,
        headers: &[(&str, &str)],
    ) -> Result<&mut Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| match e.kind() {
            IoErrorKind::NotFound | IoErrorKind::PermissionDenied => Error::invalid_argument(
                format!("File not found or not readable: {}", path.display()),
            ),
            _ => Error::invalid_argument(format!("Unable to open file: {}", path.display())),
        })?;
        let metadata = file.metadata().map_err(|_| {
            Error::invalid_argument(format!("Cannot determine file size: {}", path.display()))
        })?;
        if !metadata.is_file() {
            return Err(Error::invalid_argument(format!(
                "File not found or not readable: {}",
                path.display()
            )));
        }

        let mime = mime_guess::from_path(path).first_or_octet_stream();
        self.header(header::CONTENT_TYPE, mime.as_ref());
        self.header(header::CONTENT_LENGTH, metadata.len().to_string());
        self.put_header(header::ACCEPT_RANGES, content_types::BYTES.clone(), true);
        for (name, value) in headers {
            self.header(name, value);
        }

        self.start_stream(None);
        self.pump(file)
    }

    /// Stream any reader in `stream_buffer_size` chunks.
    pub fn stream_resource<R: Read>(
        &mut self,
        reader: R,
        content_type: Option<&str>,
    ) -> Result<&mut Self> {
        self.start_stream(content_type);
        self.pump(reader)
    }

    fn pump<R: Read>(&mut self, mut reader: R) -> Result<&mut Self> {
        let mut chunk = vec![0u8; self.stream_buffer_size.max(1)];
        loop {
            let n = match reader.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == IoErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            };
            self.write(&chunk[..n], true)?;
        }
        Ok(self)
    }

    /// Send one Server-Sent Event, entering `text/event-stream` mode first
    /// if needed.
    pub fn send_event(&mut self, data: impl Into<Data>, fields: EventFields<'_>) -> Result<&mut Self> {
        if !self.streaming {
            self.start_stream(Some("text/event-stream"));
        }
        let data = match data.into() {
            Data::Structured(value) => {
                serde_json::to_string(&value).unwrap_or_else(|_| sse::ENCODING_FAILED.to_string())
            }
            Data::Reader(_) => "[non-scalar data]".to_string(),
            other => self.coerce_text(other),
        };
        let frame = sse::frame(&data, fields);
        self.write(frame, true)
    }

    /// Comment-only keep-alive frame.
    pub fn send_heartbeat(&mut self) -> Result<&mut Self> {
        self.write(sse::HEARTBEAT, true)
    }

    /// Flush and leave streaming mode.
    pub fn end_stream(&mut self) -> Result<&mut Self> {
        if self.streaming {
            self.streaming = false;
            if !self.test_mode {
                self.output.flush()?;
            }
        }
        Ok(self)
    }

    // Emission

    /// Write status, headers (unless already on the wire) and the body.
    ///
    /// A second call after a non-streaming body went out logs a warning and
    /// writes nothing.
    pub fn emit(&mut self, include_headers: bool) -> Result<()> {
        if self.sent && !self.streaming {
            tracing::warn!(
                status = self.status.as_u16(),
                "attempted to emit response body multiple times, body already sent"
            );
            return Ok(());
        }

        if self.test_mode {
            if !self.body.is_empty() {
                self.sent = true;
            }
            return Ok(());
        }

        if include_headers && !self.output.headers_sent() {
            self.output.send_status(self.status);
            let mut last: Option<&HeaderName> = None;
            for (name, value) in &self.headers {
                let replace = last != Some(name);
                self.output.send_header(name, value, replace);
                last = Some(name);
            }
        }

        if !self.body.is_empty() {
            self.output.write_body(&self.body)?;
            self.sent = true;
        }
        self.output.flush()?;
        Ok(())
    }

    /// Forget that the body was sent.
    pub fn reset_sent_state(&mut self) -> &mut Self {
        self.sent = false;
        self
    }

    // Message-style surface

    /// The immutable snapshot, built on first access.
    pub fn message(&self) -> &ResponseMessage {
        self.snapshot.get_or_init(|| {
            self.pool.response(
                self.status,
                self.reason.clone(),
                self.version,
                self.headers.clone(),
                &self.body,
            )
        })
    }

    #[inline]
    pub fn has_snapshot(&self) -> bool {
        self.snapshot.get().is_some()
    }

    #[inline]
    pub fn reason_phrase(&self) -> &str {
        self.message().reason_phrase()
    }

    #[inline]
    pub fn protocol_version(&self) -> &'static str {
        self.message().protocol_version()
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
    pub fn body_stream(&self) -> &Stream {
        self.message().body()
    }

    pub fn with_status(&self, code: u16, reason: Option<&str>) -> Result<Self> {
        let status = StatusCode::from_u16(code)
            .map_err(|_| Error::invalid_argument(format!("Invalid status code: {code}")))?;
        let mut next = self.fork();
        next.status = status;
        next.reason = reason.filter(|r| !r.is_empty()).map(str::to_string);
        Ok(next)
    }

    pub fn with_header(&self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = header_pair(name, value)
            .ok_or_else(|| Error::invalid_argument(format!("Invalid header: {name}")))?;
        let mut next = self.fork();
        next.headers.insert(name, value);
        Ok(next)
    }

    pub fn with_added_header(&self, name: &str, value: &str) -> Result<Self> {
        let (name, value) = header_pair(name, value)
            .ok_or_else(|| Error::invalid_argument(format!("Invalid header: {name}")))?;
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
        next.body = body.into().to_vec();
        next
    }

    pub fn with_protocol_version(&self, version: &str) -> Self {
        let mut next = self.fork();
        next.version = HttpVersion::parse(version);
        next
    }

    // Internals

    /// Status/header changes reach the sink only while its head is open.
    #[inline]
    fn live_head(&self) -> bool {
        !self.test_mode && !self.output.headers_sent()
    }

    fn replace_body(&mut self, body: Vec<u8>) {
        self.body = body;
        self.invalidate();
    }

    fn auto_emit(&mut self) {
        if self.test_mode || !self.auto_emit {
            return;
        }
        if let Err(e) = self.emit(true) {
            tracing::warn!(error = %e, "automatic response emission failed");
        }
    }

    /// Text form of a payload; structures and unreadable readers go through
    /// JSON-safe encoding.
    fn coerce_text(&self, data: Data) -> String {
        match data {
            Data::Null => String::new(),
            Data::Bool(true) => "1".to_string(),
            Data::Bool(false) => String::new(),
            Data::Number(n) => n.to_string(),
            Data::Text(s) => s,
            Data::Structured(value) => json::encode_direct(&value),
            Data::Reader(mut reader) => {
                let mut buf = Vec::new();
                match reader.read_to_end(&mut buf) {
                    Ok(_) => json::sanitize_bytes(&buf),
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to read response payload");
                        String::new()
                    }
                }
            }
        }
    }

    fn fork(&self) -> Self {
        Self {
            status: self.status,
            reason: self.reason.clone(),
            version: self.version,
            headers: self.headers.clone(),
            body: self.body.clone(),
            streaming: self.streaming,
            stream_buffer_size: self.stream_buffer_size,
            test_mode: self.test_mode,
            auto_emit: self.auto_emit,
            sent: self.sent,
            output: Arc::clone(&self.output),
            encoder: Arc::clone(&self.encoder),
            json_threshold: self.json_threshold,
            pool: Arc::clone(&self.pool),
            snapshot: OnceLock::new(),
        }
    }

    fn invalidate(&mut self) {
        if let Some(snapshot) = self.snapshot.take() {
            self.pool.release_response(snapshot);
        }
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Response {
    fn drop(&mut self) {
        self.invalidate();
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Response")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .field("streaming", &self.streaming)
            .field("sent", &self.sent)
            .field("test_mode", &self.test_mode)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Response`].
pub struct ResponseBuilder {
    output: Option<Arc<dyn OutputSink>>,
    encoder: Option<Arc<dyn JsonEncoder>>,
    pool: Option<Arc<Psr7Pool>>,
    test_mode: Option<bool>,
    auto_emit: bool,
    stream_buffer_size: usize,
    json_threshold: usize,
}

impl ResponseBuilder {
    pub fn new() -> Self {
        Self {
            output: None,
            encoder: None,
            pool: None,
            test_mode: None,
            auto_emit: true,
            stream_buffer_size: DEFAULT_STREAM_BUFFER_SIZE,
            json_threshold: DEFAULT_POOL_THRESHOLD,
        }
    }

    /// Sink for emission (default: stdout).
    pub fn output(mut self, output: Arc<dyn OutputSink>) -> Self {
        self.output = Some(output);
        self
    }

    /// Encoder for payloads above the pool threshold (default: direct).
    pub fn encoder(mut self, encoder: Arc<dyn JsonEncoder>) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn pool(mut self, pool: Arc<Psr7Pool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Force test mode on or off instead of detecting it.
    pub fn test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = Some(test_mode);
        self
    }

    pub fn auto_emit(mut self, auto_emit: bool) -> Self {
        self.auto_emit = auto_emit;
        self
    }

    pub fn stream_buffer_size(mut self, size: usize) -> Self {
        self.stream_buffer_size = size.max(1);
        self
    }

    pub fn json_threshold(mut self, threshold: usize) -> Self {
        self.json_threshold = threshold;
        self
    }

    pub fn build(self) -> Response {
        Response {
            status: StatusCode::OK,
            reason: None,
            version: HttpVersion::HTTP_11,
            headers: HeaderMap::new(),
            body: Vec::new(),
            streaming: false,
            stream_buffer_size: self.stream_buffer_size,
            test_mode: self.test_mode.unwrap_or_else(detect_test_mode),
            auto_emit: self.auto_emit,
            sent: false,
            output: self.output.unwrap_or_else(|| Arc::new(StdoutOutput::new())),
            encoder: self.encoder.unwrap_or_else(|| Arc::new(DirectEncoder)),
            json_threshold: self.json_threshold,
            pool: self.pool.unwrap_or_else(Psr7Pool::shared),
            snapshot: OnceLock::new(),
        }
    }
}

impl Default for ResponseBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn header_pair(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    match (HeaderName::try_from(name), HeaderValue::try_from(value)) {
        (Ok(name), Ok(value)) => Some((name, value)),
        _ => {
            tracing::debug!(header = name, "skipping invalid response header");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::kinds;
    use std::io::Write as _;

    /// Live response writing into a buffer.
    fn live() -> (Response, BufferedOutput) {
        let out = BufferedOutput::new();
        let res = Response::builder()
            .output(Arc::new(out.clone()))
            .pool(Arc::new(Psr7Pool::new(8)))
            .test_mode(false)
            .build();
        (res, out)
    }

    #[test]
    fn test_defaults_in_test_mode() {
        let res = Response::new();
        assert_eq!(res.status_code(), 200);
        assert!(res.is_test_mode());
        assert!(res.body().is_empty());
        assert!(!res.is_sent());
    }

    #[test]
    fn test_json_sets_content_type_and_auto_emits() {
        let (mut res, out) = live();
        res.status(201).json(&json!({"url": "http://a/b", "name": "Zoë"}));

        assert_eq!(res.header_value("content-type"), Some("application/json; charset=utf-8"));
        assert_eq!(out.body_string(), r#"{"name":"Zoë","url":"http://a/b"}"#);
        assert_eq!(out.status(), StatusCode::CREATED);
        assert!(res.is_sent());
    }

    #[test]
    fn test_emit_is_idempotent() {
        let (mut res, out) = live();
        res.disable_auto_emit(true).text("hello");
        assert!(out.body().is_empty());

        res.emit(true).unwrap();
        res.emit(true).unwrap();
        assert_eq!(out.body(), b"hello");
        assert_eq!(out.writes(), 1);

        res.reset_sent_state().emit(true).unwrap();
        assert_eq!(out.body(), b"hellohello");
    }

    #[test]
    fn test_late_headers_are_skipped_on_the_wire() {
        let (mut res, out) = live();
        res.header("X-Early", "1");
        res.write("chunk", true).unwrap();
        assert!(out.headers_sent());

        res.header("X-Late", "2").status(500);
        assert_eq!(res.header_value("x-late"), Some("2"));
        let sent = out.headers();
        assert!(sent.contains_key("x-early"));
        assert!(!sent.contains_key("x-late"));
        assert_eq!(out.status(), StatusCode::OK);
    }

    #[test]
    fn test_send_dispatch() {
        let mut res = Response::new();
        res.send(json!({"a": 1}));
        assert_eq!(res.header_value("content-type"), Some("application/json; charset=utf-8"));

        res.send("<p>hi</p>");
        assert_eq!(res.header_value("content-type"), Some("text/html; charset=utf-8"));

        res.send("plain");
        assert_eq!(res.header_value("content-type"), Some("text/plain; charset=utf-8"));
        assert_eq!(res.body(), b"plain");

        res.send(42);
        assert_eq!(res.body(), b"42");
        assert_eq!(res.header_value("content-type"), Some("text/plain; charset=utf-8"));

        let mut res = Response::new();
        res.send(Data::reader(&b"streamed bytes"[..]));
        assert!(res.is_streaming());
        assert_eq!(res.body(), b"streamed bytes");
    }

    #[test]
    fn test_text_coerces_structures() {
        let mut res = Response::new();
        res.text(json!([1, 2]));
        assert_eq!(res.body(), b"[1,2]");
        res.html(true);
        assert_eq!(res.body(), b"1");
    }

    #[test]
    fn test_error_and_success_payloads() {
        let mut res = Response::new();
        res.error(404, "");
        assert_eq!(res.status_code(), 404);
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body, json!({"error": "Not Found", "code": 404}));

        res.error(418, "");
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body["error"], "Error");

        res.success(&json!({"id": 1}), "Created");
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert_eq!(body, json!({"success": true, "message": "Created", "data": {"id": 1}}));

        res.success(&(), "Success");
        let body: Value = serde_json::from_slice(res.body()).unwrap();
        assert!(body.get("data").is_none());
    }

    #[test]
    fn test_redirect_and_cookies() {
        let mut res = Response::new();
        res.redirect("/login", 302)
            .cookie("a", "1", CookieOptions::default())
            .clear_cookie("b", "/", None);
        assert_eq!(res.status_code(), 302);
        assert_eq!(res.header_value("location"), Some("/login"));
        assert_eq!(res.headers().get_all("set-cookie").iter().count(), 2);
    }

    #[test]
    fn test_sse_event_framing() {
        let (mut res, out) = live();
        res.send_event(json!({"x": 1}), EventFields::new().event("update").id("5"))
            .unwrap();
        assert!(res.is_streaming());
        assert_eq!(res.header_value("content-type"), Some("text/event-stream"));
        assert_eq!(res.header_value("cache-control"), Some("no-cache"));

        let text = out.body_string();
        let lines: Vec<&str> = text.split('\n').collect();
        assert_eq!(lines[..4], ["id: 5", "event: update", "data: {\"x\":1}", ""]);

        res.send_heartbeat().unwrap();
        assert!(out.body_string().ends_with(": heartbeat\n\n"));
        res.end_stream().unwrap();
        assert!(!res.is_streaming());
    }

    #[test]
    fn test_stream_file() {
        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(b"0123456789").unwrap();

        let (mut res, out) = live();
        res.set_stream_buffer_size(4);
        res.stream_file(file.path(), &[("X-Extra", "yes")]).unwrap();

        assert_eq!(out.body(), b"0123456789");
        assert_eq!(out.writes(), 3);
        let headers = out.headers();
        assert_eq!(headers["content-length"], "10");
        assert_eq!(headers["accept-ranges"], "bytes");
        assert_eq!(headers["x-extra"], "yes");
        assert!(headers["content-type"].to_str().unwrap().starts_with("text/plain"));
    }

    #[test]
    fn test_stream_file_missing() {
        let mut res = Response::new();
        let err = res.stream_file("/definitely/not/here.bin", &[]).unwrap_err();
        assert_eq!(err.kind(), crate::core::ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_snapshot_and_with_copies() {
        let pool = Arc::new(Psr7Pool::new(8));
        let mut res = Response::builder().pool(Arc::clone(&pool)).build();
        res.status(404).header("X-A", "1");

        assert_eq!(res.reason_phrase(), "Not Found");
        assert_eq!(res.protocol_version(), "1.1");
        assert!(res.has_snapshot());

        let copy = res.with_status(200, Some("Fine")).unwrap().with_added_header("x-a", "2").unwrap();
        assert_eq!(copy.reason_phrase(), "Fine");
        assert_eq!(copy.header_values("x-a"), vec!["1", "2"]);
        assert_eq!(res.status_code(), 404);

        let copy = copy.without_header("x-a").with_body("new").with_protocol_version("2");
        assert!(!copy.has_header("x-a"));
        assert_eq!(copy.body_stream().contents(), b"new");
        assert_eq!(copy.protocol_version(), "2.0");

        res.text("changed");
        assert!(!res.has_snapshot());
        assert_eq!(pool.objects().size(kinds::RESPONSE), 1);
        assert_eq!(res.body_stream().contents(), b"changed");
    }
}
