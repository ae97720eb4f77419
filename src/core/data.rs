//! Payload accepted by the response body helpers.

use std::fmt;
use std::io::Read;

use serde_json::{Number, Value};

/// A value handed to `Response::send`, `text`, `html` or `send_event`.
pub enum Data {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    /// Arrays and objects.
    Structured(Value),
    /// Readable byte source, streamed rather than buffered.
    Reader(Box<dyn Read + Send>),
}

impl Data {
    /// Wrap any reader.
    pub fn reader<R: Read + Send + 'static>(reader: R) -> Self {
        Data::Reader(Box::new(reader))
    }

    /// Serialize an arbitrary value into structured data.
    ///
    /// Serialization failures produce `Structured({})`, matching the
    /// degrade-to-empty-object rule for JSON output.
    pub fn from_serialize<T: serde::Serialize + ?Sized>(value: &T) -> Self {
        match serde_json::to_value(value) {
            Ok(v) => Data::from(v),
            Err(e) => {
                tracing::warn!(error = %e, "failed to serialize payload, using empty object");
                Data::Structured(Value::Object(Default::default()))
            }
        }
    }

    #[inline]
    pub fn is_structured(&self) -> bool {
        matches!(self, Data::Structured(_))
    }

    /// Whether this is a string containing something that looks like a tag.
    pub fn looks_like_html(&self) -> bool {
        match self {
            Data::Text(s) => contains_tag(s),
            _ => false,
        }
    }
}

/// `<` followed by one or more non-`<` characters and then `>`.
fn contains_tag(s: &str) -> bool {
    let bytes = s.as_bytes();
    let mut open: Option<usize> = None;
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'<' => open = Some(i),
            b'>' => {
                if let Some(start) = open {
                    if i > start + 1 {
                        return true;
                    }
                }
            }
            _ => {}
        }
    }
    false
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Data::Null => f.write_str("Null"),
            Data::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
            Data::Number(n) => f.debug_tuple("Number").field(n).finish(),
            Data::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Data::Structured(v) => f.debug_tuple("Structured").field(v).finish(),
            Data::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

impl From<Value> for Data {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => Data::Null,
            Value::Bool(b) => Data::Bool(b),
            Value::Number(n) => Data::Number(n),
            Value::String(s) => Data::Text(s),
            other => Data::Structured(other),
        }
    }
}

impl From<&str> for Data {
    fn from(s: &str) -> Self {
        Data::Text(s.to_string())
    }
}

impl From<String> for Data {
    fn from(s: String) -> Self {
        Data::Text(s)
    }
}

impl From<&String> for Data {
    fn from(s: &String) -> Self {
        Data::Text(s.clone())
    }
}

impl From<bool> for Data {
    fn from(b: bool) -> Self {
        Data::Bool(b)
    }
}

impl From<()> for Data {
    fn from(_: ()) -> Self {
        Data::Null
    }
}

macro_rules! data_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Data {
                fn from(n: $t) -> Self {
                    Data::Number(Number::from(n))
                }
            }
        )*
    };
}

data_from_int!(i8, i16, i32, i64, u8, u16, u32, u64, usize, isize);

impl From<f64> for Data {
    fn from(n: f64) -> Self {
        match Number::from_f64(n) {
            Some(n) => Data::Number(n),
            None => Data::Text(n.to_string()),
        }
    }
}

impl<T: Into<Data>> From<Option<T>> for Data {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Data::Null)
    }
}
