//! Outbound transports for [`Response`](super::Response) emission.
//!
//! A sink holds a pending status line and header block until the first body
//! byte (or an explicit flush) commits them. After that `headers_sent`
//! reports true and status/header calls are ignored, which is what lets the
//! response skip late header mutations instead of corrupting the stream.

use std::io::{self, Write};
use std::sync::Arc;

use http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use parking_lot::Mutex;

/// Destination for status, headers and body bytes.
pub trait OutputSink: Send + Sync {
    /// Whether the head has been committed to the transport.
    fn headers_sent(&self) -> bool;

    fn send_status(&self, status: StatusCode);

    /// Set a header; `replace` drops previous values of the same name.
    fn send_header(&self, name: &HeaderName, value: &HeaderValue, replace: bool);

    /// Write body bytes, committing the head first if needed.
    fn write_body(&self, data: &[u8]) -> io::Result<()>;

    /// Push buffered bytes to the client, committing the head if needed.
    fn flush(&self) -> io::Result<()>;
}

/// Status and headers waiting to be committed.
#[derive(Debug, Clone)]
pub struct PendingHead {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub committed: bool,
}

impl Default for PendingHead {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            committed: false,
        }
    }
}

impl PendingHead {
    pub fn set_status(&mut self, status: StatusCode) {
        if !self.committed {
            self.status = status;
        }
    }

    pub fn set_header(&mut self, name: &HeaderName, value: &HeaderValue, replace: bool) {
        if self.committed {
            return;
        }
        if replace {
            self.headers.insert(name.clone(), value.clone());
        } else {
            self.headers.append(name.clone(), value.clone());
        }
    }

    /// Mark committed, returning the head the first time only.
    pub fn commit(&mut self) -> Option<(StatusCode, HeaderMap)> {
        if self.committed {
            return None;
        }
        self.committed = true;
        Some((self.status, std::mem::take(&mut self.headers)))
    }
}

/// What a [`BufferedOutput`] has captured.
#[derive(Debug, Clone, Default)]
pub struct Captured {
    pub head: PendingHead,
    /// Head as committed (empty until the first write or flush).
    pub sent_status: Option<StatusCode>,
    pub sent_headers: HeaderMap,
    pub body: Vec<u8>,
    pub writes: usize,
    pub flushes: usize,
}

/// In-memory sink. Clones share the same buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferedOutput {
    inner: Arc<Mutex<Captured>>,
}

impl BufferedOutput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body bytes written so far.
    pub fn body(&self) -> Vec<u8> {
        self.inner.lock().body.clone()
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.inner.lock().body).into_owned()
    }

    /// Committed status, or the pending one.
    pub fn status(&self) -> StatusCode {
        let captured = self.inner.lock();
        captured.sent_status.unwrap_or(captured.head.status)
    }

    /// Committed headers, or the pending ones.
    pub fn headers(&self) -> HeaderMap {
        let captured = self.inner.lock();
        if captured.head.committed {
            captured.sent_headers.clone()
        } else {
            captured.head.headers.clone()
        }
    }

    /// Number of body writes.
    pub fn writes(&self) -> usize {
        self.inner.lock().writes
    }

    pub fn flushes(&self) -> usize {
        self.inner.lock().flushes
    }

    /// Snapshot of everything captured.
    pub fn captured(&self) -> Captured {
        self.inner.lock().clone()
    }

    fn commit(captured: &mut Captured) {
        if let Some((status, headers)) = captured.head.commit() {
            captured.sent_status = Some(status);
            captured.sent_headers = headers;
        }
    }
}

impl OutputSink for BufferedOutput {
    fn headers_sent(&self) -> bool {
        self.inner.lock().head.committed
    }

    fn send_status(&self, status: StatusCode) {
        self.inner.lock().head.set_status(status);
    }

    fn send_header(&self, name: &HeaderName, value: &HeaderValue, replace: bool) {
        self.inner.lock().head.set_header(name, value, replace);
    }

    fn write_body(&self, data: &[u8]) -> io::Result<()> {
        let mut captured = self.inner.lock();
        Self::commit(&mut captured);
        captured.body.extend_from_slice(data);
        captured.writes += 1;
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        let mut captured = self.inner.lock();
        Self::commit(&mut captured);
        captured.flushes += 1;
        Ok(())
    }
}

/// CGI-style sink writing `Status:` plus headers, a blank line, then the body
/// to stdout.
#[derive(Debug, Default)]
pub struct StdoutOutput {
    head: Mutex<PendingHead>,
}

impl StdoutOutput {
    pub fn new() -> Self {
        Self::default()
    }

    fn commit(&self, out: &mut impl Write) -> io::Result<()> {
        let Some((status, headers)) = self.head.lock().commit() else {
            return Ok(());
        };
        out.write_all(render_cgi_head(status, &headers).as_bytes())
    }
}

impl OutputSink for StdoutOutput {
    fn headers_sent(&self) -> bool {
        self.head.lock().committed
    }

    fn send_status(&self, status: StatusCode) {
        self.head.lock().set_status(status);
    }

    fn send_header(&self, name: &HeaderName, value: &HeaderValue, replace: bool) {
        self.head.lock().set_header(name, value, replace);
    }

    fn write_body(&self, data: &[u8]) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.commit(&mut out)?;
        out.write_all(data)
    }

    fn flush(&self) -> io::Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.commit(&mut out)?;
        out.flush()
    }
}

/// CGI response head: `Status: 200 OK` then one line per header value.
pub fn render_cgi_head(status: StatusCode, headers: &HeaderMap) -> String {
    let mut head = String::with_capacity(64 + headers.len() * 32);
    head.push_str("Status: ");
    head.push_str(status.as_str());
    if let Some(reason) = status.canonical_reason() {
        head.push(' ');
        head.push_str(reason);
    }
    head.push_str("\r\n");

    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            head.push_str(name.as_str());
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
    }
    head.push_str("\r\n");
    head
}
