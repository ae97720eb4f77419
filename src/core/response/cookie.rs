//! `Set-Cookie` rendering.

use std::time::{Duration, SystemTime};

use crate::time::Timestamp;

/// `SameSite` attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    fn as_str(self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Cookie attributes. Defaults: session cookie, path `/`, http-only.
#[derive(Debug, Clone)]
pub struct CookieOptions {
    pub expires: Option<SystemTime>,
    pub max_age: Option<i64>,
    pub path: String,
    pub domain: Option<String>,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            expires: None,
            max_age: None,
            path: "/".to_string(),
            domain: None,
            secure: false,
            http_only: true,
            same_site: None,
        }
    }
}

impl CookieOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire `ttl` from now.
    pub fn expires_in(mut self, ttl: Duration) -> Self {
        self.expires = Some(SystemTime::now() + ttl);
        self.max_age = Some(ttl.as_secs() as i64);
        self
    }

    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.same_site = Some(same_site);
        self
    }
}

/// Characters a cookie value may carry unencoded.
const VALUE_ESCAPES: &percent_encoding::AsciiSet = &percent_encoding::CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b',')
    .add(b';')
    .add(b'\\')
    .add(b'%');

/// `name=value; Expires=...; Max-Age=...; Path=/; Domain=...; Secure; HttpOnly; SameSite=...`
pub fn render(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut out = String::with_capacity(name.len() + value.len() + 64);
    out.push_str(name);
    out.push('=');
    out.extend(percent_encoding::utf8_percent_encode(value, VALUE_ESCAPES));

    if let Some(expires) = options.expires {
        out.push_str("; Expires=");
        out.push_str(&Timestamp::from_system_time(expires).http_date());
    }
    if let Some(max_age) = options.max_age {
        out.push_str("; Max-Age=");
        out.push_str(&max_age.to_string());
    }
    if !options.path.is_empty() {
        out.push_str("; Path=");
        out.push_str(&options.path);
    }
    if let Some(domain) = options.domain.as_deref().filter(|d| !d.is_empty()) {
        out.push_str("; Domain=");
        out.push_str(domain);
    }
    if options.secure {
        out.push_str("; Secure");
    }
    if options.http_only {
        out.push_str("; HttpOnly");
    }
    if let Some(same_site) = options.same_site {
        out.push_str("; SameSite=");
        out.push_str(same_site.as_str());
    }
    out
}

/// Deletion cookie: empty value, expiry in the past.
pub fn render_clear(name: &str, path: &str, domain: Option<&str>) -> String {
    let mut options = CookieOptions {
        expires: Some(SystemTime::UNIX_EPOCH),
        max_age: Some(0),
        path: path.to_string(),
        http_only: false,
        ..CookieOptions::default()
    };
    if let Some(domain) = domain {
        options.domain = Some(domain.to_string());
    }
    render(name, "", &options)
}
