//! JSON encoding for response bodies.
//!
//! Encoding never fails from the caller's point of view: values that cannot
//! be serialized degrade to `{}` with a warning, and payloads above the pool
//! threshold go through a [`JsonEncoder`] whose failures fall back to direct
//! encoding.

use std::sync::Arc;

use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::core::Result;
use crate::pool::Psr7Pool;

/// Default estimated size (bytes) above which pooled encoding is used.
pub const DEFAULT_POOL_THRESHOLD: usize = 4096;

const EMPTY_OBJECT: &str = "{}";

/// Encoder used for large payloads.
pub trait JsonEncoder: Send + Sync {
    fn encode(&self, value: &Value) -> Result<String>;
}

/// Plain `serde_json` encoding.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectEncoder;

impl JsonEncoder for DirectEncoder {
    fn encode(&self, value: &Value) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }
}

/// Encodes into scratch buffers rented from the message pool.
pub struct PooledJsonEncoder {
    pool: Arc<Psr7Pool>,
}

impl PooledJsonEncoder {
    pub fn new(pool: Arc<Psr7Pool>) -> Self {
        Self { pool }
    }
}

impl JsonEncoder for PooledJsonEncoder {
    fn encode(&self, value: &Value) -> Result<String> {
        let mut buf = self.pool.buffer(estimate_size(value, usize::MAX));
        let written = serde_json::to_writer(&mut buf, value);
        let encoded = written.map(|_| String::from_utf8_lossy(&buf).into_owned());
        self.pool.release_buffer(buf);
        Ok(encoded?)
    }
}

/// Rough serialized size of `value`, stopping early once `limit` is reached.
pub fn estimate_size(value: &Value, limit: usize) -> usize {
    fn walk(value: &Value, total: &mut usize, limit: usize) {
        if *total >= limit {
            return;
        }
        match value {
            Value::Null | Value::Bool(_) => *total += 5,
            Value::Number(_) => *total += 8,
            Value::String(s) => *total += s.len() + 2,
            Value::Array(items) => {
                *total += 2;
                for item in items {
                    walk(item, total, limit);
                    *total += 1;
                }
            }
            Value::Object(map) => {
                *total += 2;
                for (key, item) in map {
                    *total += key.len() + 4;
                    walk(item, total, limit);
                }
            }
        }
    }

    let mut total = 0;
    walk(value, &mut total, limit);
    total
}

/// Whether a value is big enough for the pooled encoder.
#[inline]
pub fn should_use_pool(value: &Value, threshold: usize) -> bool {
    estimate_size(value, threshold) >= threshold
}

/// Convert anything serializable to a JSON value, degrading to `{}`.
pub fn to_value_lossy<T: Serialize + ?Sized>(data: &T) -> Value {
    match serde_json::to_value(data) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(error = %e, "JSON encoding failed, using empty object");
            Value::Object(Default::default())
        }
    }
}

/// Encode without pooling; `{}` on failure.
pub fn encode_direct<T: Serialize + ?Sized>(data: &T) -> String {
    match serde_json::to_string(data) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "JSON encoding failed, using empty object");
            EMPTY_OBJECT.to_string()
        }
    }
}

/// Encode a value, routing large payloads through `encoder`.
pub fn encode(value: &Value, encoder: &dyn JsonEncoder, threshold: usize) -> String {
    if !should_use_pool(value, threshold) {
        return encode_direct(value);
    }
    match encoder.encode(value) {
        Ok(s) => s,
        Err(e) => {
            tracing::warn!(error = %e, "pooled JSON encoding failed, falling back to direct encoding");
            encode_direct(value)
        }
    }
}

/// Byte string serialized as text, invalid UTF-8 replaced with U+FFFD.
#[derive(Debug, Clone, Copy)]
pub struct Utf8Lossy<'a>(pub &'a [u8]);

impl Serialize for Utf8Lossy<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&String::from_utf8_lossy(self.0))
    }
}

/// Text from raw bytes, invalid sequences replaced.
#[inline]
pub fn sanitize_bytes(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}
