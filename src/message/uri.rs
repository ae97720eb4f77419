//! Request URI value.

use std::fmt;

use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

/// Characters `http::Uri` rejects that clients still send.
const LENIENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'|')
    .add(b'\\')
    .add(b'^');

/// Parsed URI. Unparseable input degrades to `/`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Uri {
    inner: http::Uri,
}

impl Uri {
    pub fn parse(s: &str) -> Self {
        Self { inner: parse_lenient(s) }
    }

    /// Re-parse in place (used when a pooled instance is reused).
    pub fn reset(&mut self, s: &str) {
        self.inner = parse_lenient(s);
    }

    #[inline]
    pub fn scheme(&self) -> Option<&str> {
        self.inner.scheme_str()
    }

    #[inline]
    pub fn host(&self) -> Option<&str> {
        self.inner.host()
    }

    #[inline]
    pub fn port(&self) -> Option<u16> {
        self.inner.port_u16()
    }

    #[inline]
    pub fn path(&self) -> &str {
        self.inner.path()
    }

    #[inline]
    pub fn query(&self) -> Option<&str> {
        self.inner.query()
    }

    /// Path and query ("/a?b=1").
    pub fn path_and_query(&self) -> &str {
        self.inner
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/")
    }

    #[inline]
    pub fn as_http(&self) -> &http::Uri {
        &self.inner
    }
}

impl Default for Uri {
    fn default() -> Self {
        Self {
            inner: http::Uri::from_static("/"),
        }
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

fn parse_lenient(s: &str) -> http::Uri {
    if s.is_empty() {
        return http::Uri::from_static("/");
    }
    if let Ok(uri) = s.parse::<http::Uri>() {
        return uri;
    }

    let encoded = utf8_percent_encode(s, LENIENT).to_string();
    match encoded.parse::<http::Uri>() {
        Ok(uri) => uri,
        Err(e) => {
            tracing::debug!(uri = s, error = %e, "unparseable uri, using /");
            http::Uri::from_static("/")
        }
    }
}
