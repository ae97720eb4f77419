//! Route pattern compilation and parameter extraction.

use regex::Regex;
use serde_json::{Map, Value};

use crate::core::{Error, Result};

/// One `/:name` or `/:name<constraint>` occurrence.
struct Placeholder<'a> {
    start: usize,
    end: usize,
    name: &'a str,
    constraint: Option<&'a str>,
}

/// Scan a pattern for placeholders, left to right.
fn placeholders(pattern: &str) -> Vec<Placeholder<'_>> {
    let mut found = Vec::new();
    let mut from = 0;

    while let Some(offset) = pattern[from..].find("/:") {
        let start = from + offset;
        let name_start = start + 2;
        let rest = &pattern[name_start..];
        let name_len = rest.find(['/', '<']).unwrap_or(rest.len());
        let mut end = name_start + name_len;

        let mut constraint = None;
        if pattern[end..].starts_with('<') {
            if let Some(close) = pattern[end..].find('>') {
                constraint = Some(&pattern[end + 1..end + close]);
                end += close + 1;
            }
        }

        if name_len > 0 {
            found.push(Placeholder {
                start,
                end,
                name: &pattern[name_start..name_start + name_len],
                constraint,
            });
        }
        from = end.max(start + 2);
    }

    found
}

/// A compiled route pattern.
#[derive(Clone, Debug)]
pub struct RoutePattern {
    raw: String,
    names: Vec<String>,
    regex: Regex,
}

impl RoutePattern {
    /// Compile `/users/:id/posts/:slug<[a-z-]+>`.
    ///
    /// Literal text is matched verbatim, each placeholder captures one
    /// segment (or its constraint), and a trailing slash is optional.
    pub fn compile(pattern: &str) -> Result<Self> {
        let mut names = Vec::new();
        let mut source = String::with_capacity(pattern.len() + 16);
        let mut last = 0;

        for ph in placeholders(pattern) {
            source.push_str(&regex::escape(&pattern[last..ph.start]));
            // Named groups keep groups inside a constraint from shifting
            // later placeholders.
            source.push_str(&format!("/(?P<p{}>", names.len()));
            source.push_str(ph.constraint.unwrap_or("[^/]+"));
            source.push(')');
            names.push(ph.name.to_string());
            last = ph.end;
        }
        source.push_str(&regex::escape(&pattern[last..]));

        let trimmed = source.trim_end_matches('/');
        let regex = Regex::new(&format!("^{trimmed}/?$")).map_err(|e| {
            Error::invalid_argument(format!("Invalid route pattern '{pattern}': {e}"))
        })?;

        Ok(Self {
            raw: pattern.to_string(),
            names,
            regex,
        })
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Placeholder names in order of appearance.
    #[inline]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Captured segment values, or `None` when the path does not match.
    pub fn captures(&self, path: &str) -> Option<Vec<String>> {
        let path = path.trim_end_matches('/');
        let caps = self.regex.captures(path)?;
        Some(
            (0..self.names.len())
                .map(|i| {
                    caps.name(&format!("p{i}"))
                        .map(|m| m.as_str().to_string())
                        .unwrap_or_default()
                })
                .collect(),
        )
    }

    #[inline]
    pub fn is_match(&self, path: &str) -> bool {
        self.regex.is_match(path.trim_end_matches('/'))
    }

    /// Extract named parameters from a concrete path.
    ///
    /// A path that does not match yields no values, which is only an error
    /// when the pattern declares placeholders.
    pub fn params(&self, path: &str) -> Result<Map<String, Value>> {
        let values = self.captures(path).unwrap_or_default();
        if self.names.len() > values.len() {
            return Err(Error::invalid_argument(
                "Number of parameters does not match the number of values",
            ));
        }

        Ok(self
            .names
            .iter()
            .zip(values)
            .map(|(name, value)| (name.clone(), coerce(value)))
            .collect())
    }
}

/// Integer-looking segments become JSON integers.
pub fn coerce(value: String) -> Value {
    let digits = value.strip_prefix(['-', '+']).unwrap_or(&value);
    if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
        if let Ok(n) = value.parse::<i64>() {
            return Value::from(n);
        }
    }
    Value::String(value)
}
