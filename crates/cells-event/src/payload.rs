//! Immutable typed key/value container.
//!
//! A [`Payload`] travels with every [`Event`](crate::Event). Once built it
//! never changes; [`Payload::apply`] derives a new payload instead.
//!
//! ```text
//! Payload::new(source) ──► Payload A ──apply(values)──► Payload B
//!                             │                            │
//!                             └── unchanged                └── A ⊕ values
//! ```
//!
//! Payloads are shared by `Arc`, so cloning is cheap and a payload can be
//! read from any number of cells at once.

use crate::value::{OpaqueValue, PayloadSource, PayloadValue};
use crate::waiter::PayloadWaiter;
use crate::KEY_DEFAULT;
use chrono::{DateTime, Utc};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Key/value map used to build or overlay a payload.
pub type PayloadValues = HashMap<String, PayloadValue>;

/// Immutable, typed key/value container.
///
/// # Example
///
/// ```
/// use cells_event::Payload;
///
/// let base = Payload::new([("a", 1_i64)]);
/// let derived = base.apply([("a", 2_i64), ("b", 3_i64)]);
///
/// assert_eq!(base.get_int("a"), Some(1));
/// assert_eq!(derived.get_int("a"), Some(2));
/// assert_eq!(derived.get_int("b"), Some(3));
/// assert_eq!(derived.get_float("b"), None);
/// ```
#[derive(Clone, Default)]
pub struct Payload {
    values: Arc<PayloadValues>,
}

impl Payload {
    /// Builds a payload from any [`PayloadSource`].
    ///
    /// An existing payload is reused as-is, a map is copied and a single
    /// value is stored under [`KEY_DEFAULT`].
    pub fn new(source: impl Into<PayloadSource>) -> Self {
        match source.into() {
            PayloadSource::Empty => Self::empty(),
            PayloadSource::Payload(p) => p,
            PayloadSource::Values(values) => Self {
                values: Arc::new(values),
            },
            PayloadSource::Single(value) => {
                let mut values = PayloadValues::with_capacity(1);
                values.insert(KEY_DEFAULT.to_string(), value);
                Self {
                    values: Arc::new(values),
                }
            }
        }
    }

    /// Returns a payload with no entries.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns the raw value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&PayloadValue> {
        self.values.get(key)
    }

    /// Returns the value stored under [`KEY_DEFAULT`].
    #[must_use]
    pub fn get_default(&self) -> Option<&PayloadValue> {
        self.get(KEY_DEFAULT)
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    #[must_use]
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            PayloadValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns an `Int` value. A `Float` under the same key yields `None`.
    #[must_use]
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            PayloadValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns a `Float` value. An `Int` under the same key yields `None`.
    #[must_use]
    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.get(key)? {
            PayloadValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            PayloadValue::String(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_time(&self, key: &str) -> Option<DateTime<Utc>> {
        match self.get(key)? {
            PayloadValue::Time(t) => Some(*t),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_duration(&self, key: &str) -> Option<Duration> {
        match self.get(key)? {
            PayloadValue::Duration(d) => Some(*d),
            _ => None,
        }
    }

    /// Returns a handle to the waiter stored under `key`.
    #[must_use]
    pub fn get_waiter(&self, key: &str) -> Option<PayloadWaiter> {
        match self.get(key)? {
            PayloadValue::Waiter(w) => Some(w.clone()),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_strings(&self, key: &str) -> Option<&[String]> {
        match self.get(key)? {
            PayloadValue::Strings(v) => Some(v),
            _ => None,
        }
    }

    #[must_use]
    pub fn get_payload(&self, key: &str) -> Option<&Payload> {
        match self.get(key)? {
            PayloadValue::Payload(p) => Some(p),
            _ => None,
        }
    }

    /// Returns the opaque value under `key` if it holds a `T`.
    #[must_use]
    pub fn get_opaque<T: Any>(&self, key: &str) -> Option<&T> {
        match self.get(key)? {
            PayloadValue::Opaque(o) => o.downcast_ref::<T>(),
            _ => None,
        }
    }

    /// Returns the raw opaque handle under `key`.
    #[must_use]
    pub fn get_opaque_value(&self, key: &str) -> Option<&OpaqueValue> {
        match self.get(key)? {
            PayloadValue::Opaque(o) => Some(o),
            _ => None,
        }
    }

    /// Returns a snapshot of the keys in unspecified order.
    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }

    /// Iterates over all entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PayloadValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Visits every entry, stopping at and returning the first error.
    ///
    /// # Errors
    ///
    /// Returns whatever `visit` returns first.
    pub fn do_each<E, F>(&self, mut visit: F) -> Result<(), E>
    where
        F: FnMut(&str, &PayloadValue) -> Result<(), E>,
    {
        for (key, value) in self.values.iter() {
            visit(key, value)?;
        }
        Ok(())
    }

    /// Returns a new payload with `values` laid over this one.
    ///
    /// The receiver is left untouched. Applying an empty source returns a
    /// payload sharing the receiver's storage.
    pub fn apply(&self, values: impl Into<PayloadSource>) -> Self {
        let overlay = match values.into() {
            PayloadSource::Empty => return self.clone(),
            PayloadSource::Payload(p) if p.is_empty() => return self.clone(),
            PayloadSource::Payload(p) => {
                Arc::try_unwrap(p.values).unwrap_or_else(|shared| (*shared).clone())
            }
            PayloadSource::Values(v) => v,
            PayloadSource::Single(value) => {
                let mut v = PayloadValues::with_capacity(1);
                v.insert(KEY_DEFAULT.to_string(), value);
                v
            }
        };
        if overlay.is_empty() {
            return self.clone();
        }

        let mut merged = PayloadValues::with_capacity(self.len() + overlay.len());
        merged.extend(self.values.iter().map(|(k, v)| (k.clone(), v.clone())));
        merged.extend(overlay);
        Self {
            values: Arc::new(merged),
        }
    }

    /// Renders the payload as a JSON object.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }

    /// Returns `true` if both payloads share the same storage.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.values, &other.values)
    }
}

impl PartialEq for Payload {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other) || *self.values == *other.values
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.values.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "<{key:?}: {value}>")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.values.iter()).finish()
    }
}
