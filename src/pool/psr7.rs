//! Typed pool for HTTP message objects.

use std::sync::{Arc, OnceLock};

use http::{HeaderMap, StatusCode};

use super::{kinds, ObjectPool, PoolStats, DEFAULT_CAPACITY};
use crate::core::HttpVersion;
use crate::message::{ResponseMessage, ServerRequest, ServerRequestParts, Stream, Uri};

/// Rent-or-create wrapper over [`ObjectPool`] for message objects.
///
/// Callers never observe a miss: a recycled object is refilled in place, and
/// an empty pool falls through to a fresh allocation.
pub struct Psr7Pool {
    pool: ObjectPool,
}

static SHARED: OnceLock<Arc<Psr7Pool>> = OnceLock::new();

impl Psr7Pool {
    pub fn new(capacity: usize) -> Self {
        Self {
            pool: ObjectPool::new(capacity),
        }
    }

    /// Process-wide default pool for objects built without an explicit one.
    pub fn shared() -> Arc<Psr7Pool> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(Psr7Pool::default())))
    }

    /// The raw pool underneath.
    #[inline]
    pub fn objects(&self) -> &ObjectPool {
        &self.pool
    }

    pub fn uri(&self, s: &str) -> Box<Uri> {
        match self.pool.rent::<Uri>(kinds::URI) {
            Some(mut uri) => {
                uri.reset(s);
                uri
            }
            None => Box::new(Uri::parse(s)),
        }
    }

    pub fn release_uri(&self, uri: Box<Uri>) {
        self.pool.release(kinds::URI, uri);
    }

    pub fn stream(&self, content: &[u8]) -> Box<Stream> {
        match self.pool.rent::<Stream>(kinds::STREAM) {
            Some(mut stream) => {
                stream.reset(content);
                stream
            }
            None => Box::new(Stream::new(content)),
        }
    }

    pub fn release_stream(&self, stream: Box<Stream>) {
        self.pool.release(kinds::STREAM, stream);
    }

    pub fn server_request(&self, parts: ServerRequestParts) -> Box<ServerRequest> {
        match self.pool.rent::<ServerRequest>(kinds::REQUEST) {
            Some(mut request) => {
                request.refill(parts);
                request
            }
            None => {
                let uri = self.uri(&parts.target);
                let body = self.stream(&parts.body);
                Box::new(ServerRequest::assemble(uri, body, parts))
            }
        }
    }

    pub fn release_server_request(&self, request: Box<ServerRequest>) {
        self.pool.release(kinds::REQUEST, request);
    }

    pub fn response(
        &self,
        status: StatusCode,
        reason: Option<String>,
        version: HttpVersion,
        headers: HeaderMap,
        body: &[u8],
    ) -> Box<ResponseMessage> {
        match self.pool.rent::<ResponseMessage>(kinds::RESPONSE) {
            Some(mut message) => {
                message.refill(status, reason, version, headers, body);
                message
            }
            None => {
                let body = self.stream(body);
                Box::new(ResponseMessage::assemble(status, reason, version, headers, body))
            }
        }
    }

    pub fn release_response(&self, message: Box<ResponseMessage>) {
        self.pool.release(kinds::RESPONSE, message);
    }

    /// Pooled scratch buffer for encoders; always empty on return.
    pub fn buffer(&self, capacity: usize) -> Vec<u8> {
        match self.pool.rent::<Vec<u8>>(kinds::JSON_BUFFER) {
            Some(mut buf) => {
                buf.clear();
                buf.reserve(capacity);
                *buf
            }
            None => Vec::with_capacity(capacity),
        }
    }

    pub fn release_buffer(&self, buf: Vec<u8>) {
        self.pool.release(kinds::JSON_BUFFER, Box::new(buf));
    }

    #[inline]
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

impl Default for Psr7Pool {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    #[test]
    fn test_uri_miss_then_reuse() {
        let pool = Psr7Pool::new(4);
        let uri = pool.uri("/a");
        assert_eq!(uri.path(), "/a");

        let addr = &*uri as *const Uri;
        pool.release_uri(uri);
        let again = pool.uri("/b?x=1");
        assert_eq!(&*again as *const Uri, addr);
        assert_eq!(again.path(), "/b");
        assert_eq!(again.query(), Some("x=1"));
    }

    #[test]
    fn test_stream_is_reset_on_reuse() {
        let pool = Psr7Pool::new(4);
        pool.release_stream(pool.stream(b"old content"));
        let stream = pool.stream(b"new");
        assert_eq!(stream.contents(), b"new");
        assert_eq!(stream.tell(), 0);
    }

    #[test]
    fn test_server_request_recycling() {
        let pool = Psr7Pool::new(4);
        let first = pool.server_request(ServerRequestParts {
            method: Method::POST,
            target: "/first".into(),
            body: b"payload".to_vec(),
            ..Default::default()
        });
        assert_eq!(first.body().contents(), b"payload");
        pool.release_server_request(first);

        let second = pool.server_request(ServerRequestParts {
            target: "/second".into(),
            ..Default::default()
        });
        assert_eq!(second.method(), &Method::GET);
        assert_eq!(second.uri().path(), "/second");
        assert!(second.body().is_empty());
        assert_eq!(pool.stats().pools[kinds::REQUEST].hits, 1);
    }

    #[test]
    fn test_response_recycling() {
        let pool = Psr7Pool::new(4);
        let msg = pool.response(
            StatusCode::CREATED,
            None,
            HttpVersion::HTTP_11,
            HeaderMap::new(),
            b"{}",
        );
        assert_eq!(msg.status(), StatusCode::CREATED);
        pool.release_response(msg);
        assert_eq!(pool.objects().size(kinds::RESPONSE), 1);

        let msg = pool.response(
            StatusCode::OK,
            None,
            HttpVersion::HTTP_11,
            HeaderMap::new(),
            b"",
        );
        assert_eq!(msg.status(), StatusCode::OK);
        assert!(msg.body().is_empty());
        assert_eq!(pool.objects().size(kinds::RESPONSE), 0);
    }

    #[test]
    fn test_buffer_comes_back_empty() {
        let pool = Psr7Pool::new(2);
        let mut buf = pool.buffer(16);
        buf.extend_from_slice(b"leftover");
        pool.release_buffer(buf);

        let buf = pool.buffer(16);
        assert!(buf.is_empty());
        assert!(buf.capacity() >= 16);
    }

    #[test]
    fn test_disabled_pool_still_allocates() {
        let pool = Psr7Pool::new(4);
        pool.objects().disable();
        let uri = pool.uri("/x");
        pool.release_uri(uri);
        assert_eq!(pool.objects().size(kinds::URI), 0);
        assert_eq!(pool.uri("/y").path(), "/y");
    }
}
