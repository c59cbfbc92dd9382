//! Payload value kinds.
//!
//! [`PayloadValue`] is the closed set of value kinds a [`Payload`] can hold.
//! [`PayloadSource`] is the closed set of shapes a payload can be built from.

use crate::payload::{Payload, PayloadValues};
use crate::waiter::PayloadWaiter;
use chrono::{DateTime, SecondsFormat, Utc};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// A single value stored in a [`Payload`].
///
/// Typed getters on [`Payload`] only match their exact variant:
/// an `Int` is never returned as a `Float` and vice versa.
#[derive(Clone, Debug)]
pub enum PayloadValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Time(DateTime<Utc>),
    Duration(Duration),
    /// Reply slot of a request/response exchange.
    Waiter(PayloadWaiter),
    Strings(Vec<String>),
    /// Nested payload.
    Payload(Payload),
    /// Application value the mesh does not interpret.
    Opaque(OpaqueValue),
}

impl PayloadValue {
    /// Returns the variant name, used in logs and JSON rendering.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Time(_) => "time",
            Self::Duration(_) => "duration",
            Self::Waiter(_) => "waiter",
            Self::Strings(_) => "strings",
            Self::Payload(_) => "payload",
            Self::Opaque(_) => "opaque",
        }
    }

    /// Renders the value as JSON.
    ///
    /// Waiters and opaque values have no data representation and render
    /// as descriptive strings.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Int(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::String(s) => Value::String(s.clone()),
            Self::Time(t) => Value::String(t.to_rfc3339_opts(SecondsFormat::Micros, true)),
            Self::Duration(d) => Value::String(format!("{d:?}")),
            Self::Waiter(_) => Value::String("<waiter>".into()),
            Self::Strings(v) => Value::Array(v.iter().cloned().map(Value::String).collect()),
            Self::Payload(p) => p.to_json(),
            Self::Opaque(o) => Value::String(format!("<opaque {}>", o.type_name())),
        }
    }
}

impl PartialEq for PayloadValue {
    /// Data variants compare by value; waiters and opaque values compare
    /// by identity.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Time(a), Self::Time(b)) => a == b,
            (Self::Duration(a), Self::Duration(b)) => a == b,
            (Self::Waiter(a), Self::Waiter(b)) => a.ptr_eq(b),
            (Self::Strings(a), Self::Strings(b)) => a == b,
            (Self::Payload(a), Self::Payload(b)) => a == b,
            (Self::Opaque(a), Self::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl fmt::Display for PayloadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::String(s) => f.write_str(s),
            Self::Time(t) => f.write_str(&t.to_rfc3339_opts(SecondsFormat::Micros, true)),
            Self::Duration(d) => write!(f, "{d:?}"),
            Self::Waiter(_) => f.write_str("<waiter>"),
            Self::Strings(v) => write!(f, "[{}]", v.join(" ")),
            Self::Payload(p) => write!(f, "{{{p}}}"),
            Self::Opaque(o) => write!(f, "<opaque {}>", o.type_name()),
        }
    }
}

/// Shared, type-erased application value.
///
/// The mesh never inspects it; consumers downcast with
/// [`downcast_ref`](Self::downcast_ref) or
/// [`Payload::get_opaque`](crate::Payload::get_opaque). Whatever sits inside
/// must not be mutated after it has been published in a payload.
#[derive(Clone)]
pub struct OpaqueValue {
    value: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl OpaqueValue {
    /// Wraps an application value.
    #[must_use]
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// Returns the wrapped value if it is a `T`.
    #[must_use]
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// Returns the Rust type name of the wrapped value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if both handles share the same allocation.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for OpaqueValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpaqueValue")
            .field("type", &self.type_name)
            .finish()
    }
}

macro_rules! value_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for PayloadValue {
                fn from(v: $ty) -> Self {
                    Self::$variant(v.into())
                }
            }
        )*
    };
}

value_from! {
    bool => Bool,
    i64 => Int,
    i32 => Int,
    u32 => Int,
    f64 => Float,
    String => String,
    &str => String,
    DateTime<Utc> => Time,
    Duration => Duration,
    PayloadWaiter => Waiter,
    Vec<String> => Strings,
    Payload => Payload,
    OpaqueValue => Opaque,
}

impl From<&[&str]> for PayloadValue {
    fn from(v: &[&str]) -> Self {
        Self::Strings(v.iter().map(|s| (*s).to_string()).collect())
    }
}

/// The shapes a [`Payload`] can be built from.
///
/// - [`Empty`](Self::Empty): no values (`()` converts here)
/// - [`Payload`](Self::Payload): an existing payload, reused or overlaid as a whole
/// - [`Values`](Self::Values): a key/value map, copied entry by entry
/// - [`Single`](Self::Single): any single value, stored under
///   [`KEY_DEFAULT`](crate::KEY_DEFAULT)
///
/// # Example
///
/// ```
/// use cells_event::{Payload, PayloadValues, KEY_DEFAULT};
///
/// let single = Payload::new(42_i64);
/// assert_eq!(single.get_int(KEY_DEFAULT), Some(42));
///
/// let mapped = Payload::new([("a", 1_i64), ("b", 2_i64)]);
/// assert_eq!(mapped.len(), 2);
///
/// let empty = Payload::new(());
/// assert!(empty.is_empty());
///
/// let values: PayloadValues = PayloadValues::new();
/// assert!(Payload::new(values).is_empty());
/// ```
#[derive(Clone, Debug)]
pub enum PayloadSource {
    Empty,
    Payload(Payload),
    Values(PayloadValues),
    Single(PayloadValue),
}

impl From<()> for PayloadSource {
    fn from(_: ()) -> Self {
        Self::Empty
    }
}

impl From<Payload> for PayloadSource {
    fn from(p: Payload) -> Self {
        Self::Payload(p)
    }
}

impl From<&Payload> for PayloadSource {
    fn from(p: &Payload) -> Self {
        Self::Payload(p.clone())
    }
}

impl From<PayloadValues> for PayloadSource {
    fn from(values: PayloadValues) -> Self {
        Self::Values(values)
    }
}

impl From<PayloadValue> for PayloadSource {
    fn from(value: PayloadValue) -> Self {
        Self::Single(value)
    }
}

impl<K, V, const N: usize> From<[(K, V); N]> for PayloadSource
where
    K: Into<String>,
    V: Into<PayloadValue>,
{
    fn from(pairs: [(K, V); N]) -> Self {
        Self::Values(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

impl<K, V> From<Vec<(K, V)>> for PayloadSource
where
    K: Into<String>,
    V: Into<PayloadValue>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        Self::Values(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

macro_rules! single_source_from {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for PayloadSource {
                fn from(v: $ty) -> Self {
                    Self::Single(v.into())
                }
            }
        )*
    };
}

single_source_from! {
    bool,
    i64,
    i32,
    u32,
    f64,
    String,
    &str,
    DateTime<Utc>,
    Duration,
    PayloadWaiter,
    Vec<String>,
    OpaqueValue,
    &[&str],
}
