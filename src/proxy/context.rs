//! Per-chain side channel between modifications and the response writer.

use std::any::Any;
use std::collections::HashMap;

/// When set to a `String`, the response writer sends this as the
/// `Content-Type` header in place of whatever the origin declared.
pub const CONTENT_TYPE: &str = "content-type";

/// String-keyed store of arbitrary values, scoped to one chain.
///
/// Keys share one flat namespace; modifiers pick distinct keys by convention.
#[derive(Default)]
pub struct Context {
    values: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Box::new(value));
    }

    /// Returns the value last set under `key`.
    ///
    /// `None` if the key was never set or holds a value of another type.
    pub fn get<T: Any>(&self, key: &str) -> Option<&T> {
        self.values.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Convenience for string values, accepting both `String` and `&'static str`.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        let value = self.values.get(key)?;
        value
            .downcast_ref::<String>()
            .map(String::as_str)
            .or_else(|| value.downcast_ref::<&'static str>().copied())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.values.keys()).finish()
    }
}
