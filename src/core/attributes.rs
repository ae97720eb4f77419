//! Typed attribute store carried by requests.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Shared, type-erased attribute value.
pub type AttributeValue = Arc<dyn Any + Send + Sync>;

/// String-keyed attribute map.
///
/// Values are reference counted, so cloning the store (which every
/// `with_*` copy of a request does) never deep-copies user data.
#[derive(Clone, Default)]
pub struct Attributes {
    values: BTreeMap<String, AttributeValue>,
}

impl Attributes {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value.
    #[inline]
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Arc::new(value));
    }

    /// Insert an already shared value.
    #[inline]
    pub fn set_shared(&mut self, key: impl Into<String>, value: AttributeValue) {
        self.values.insert(key.into(), value);
    }

    /// Get a value by key and type.
    #[inline]
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref())
    }

    /// Get the shared value regardless of type.
    #[inline]
    pub fn get_shared(&self, key: &str) -> Option<&AttributeValue> {
        self.values.get(key)
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Remove a value.
    #[inline]
    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        self.values.remove(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}
