//! Opaque positional query parameters.
//!
//! Queries in this layer bind parameters by 1-based position, in the order
//! supplied. [`Value`] is the carrier: a small closed set of primitives
//! that every supported provider can bind, plus [`Value::List`] for `IN`
//! membership expressions.

use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// An opaque positional parameter (or decoded column) value.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    DateTime(DateTime<Utc>),
    /// Element list, used only for `IN` membership parameters.
    List(Vec<Value>),
}

impl Value {
    /// Builds a [`Value::List`] from anything convertible element-wise.
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Self::List(items.into_iter().map(Into::into).collect())
    }

    /// True for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Converts into the JSON representation used for record <-> entity
    /// mapping. `Uuid` and `DateTime` become their canonical text forms.
    #[must_use]
    pub fn into_json(self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(b),
            Self::Int(i) => JsonValue::from(i),
            Self::Float(f) => serde_json::Number::from_f64(f)
                .map_or(JsonValue::Null, JsonValue::Number),
            Self::Text(s) => JsonValue::String(s),
            // serde_json::to_value cannot fail for these
            Self::Bytes(b) => serde_json::to_value(b).unwrap_or(JsonValue::Null),
            Self::Uuid(u) => JsonValue::String(u.to_string()),
            Self::DateTime(dt) => serde_json::to_value(dt).unwrap_or(JsonValue::Null),
            Self::List(items) => {
                JsonValue::Array(items.into_iter().map(Value::into_json).collect())
            }
        }
    }

    /// Builds a value from the JSON representation of an entity field.
    ///
    /// Nested objects are carried as their JSON text; mapped entities are
    /// expected to be flat column sets, the same constraint the wrapped
    /// providers impose.
    #[must_use]
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            JsonValue::String(s) => Self::Text(s),
            JsonValue::Array(items) => {
                Self::List(items.into_iter().map(Value::from_json).collect())
            }
            obj @ JsonValue::Object(_) => Self::Text(obj.to_string()),
        }
    }
}

/// Equality is representation-tolerant for identifiers and timestamps:
/// a `Uuid` or `DateTime` compares equal to its canonical text form, since
/// rows read back from a text-typed store carry strings.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Bytes(a), Self::Bytes(b)) => a == b,
            (Self::Uuid(a), Self::Uuid(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Bool(b), Self::Int(i)) | (Self::Int(i), Self::Bool(b)) => {
                i64::from(*b) == *i
            }
            (Self::Uuid(u), Self::Text(s)) | (Self::Text(s), Self::Uuid(u)) => {
                Uuid::parse_str(s).is_ok_and(|parsed| parsed == *u)
            }
            (Self::DateTime(dt), Self::Text(s)) | (Self::Text(s), Self::DateTime(dt)) => {
                DateTime::parse_from_rfc3339(s)
                    .is_ok_and(|parsed| parsed.with_timezone(&Utc) == *dt)
            }
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i16> for Value {
    fn from(v: i16) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Bytes(v)
    }
}

impl From<Uuid> for Value {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Builds a `Vec<Value>` of positional parameters.
///
/// ```
/// use stele_core::{params, Value};
///
/// let p = params!["alice", 30];
/// assert_eq!(p, vec![Value::Text("alice".into()), Value::Int(30)]);
/// ```
#[macro_export]
macro_rules! params {
    () => {
        Vec::<$crate::Value>::new()
    };
    ($($v:expr),+ $(,)?) => {
        vec![$($crate::Value::from($v)),+]
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_impls() {
        assert_eq!(Value::from(7i32), Value::Int(7));
        assert_eq!(Value::from("x"), Value::Text("x".into()));
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(Option::<i64>::None), Value::Null);
        assert_eq!(Value::from(Some(5i64)), Value::Int(5));
    }

    #[test]
    fn test_params_macro() {
        let empty = params![];
        assert!(empty.is_empty());
        let p = params!["a", 1, 2.5];
        assert_eq!(p.len(), 3);
        assert_eq!(p[2], Value::Float(2.5));
    }

    #[test]
    fn test_uuid_text_equality() {
        let id = Uuid::new_v4();
        assert_eq!(Value::Uuid(id), Value::Text(id.to_string()));
        assert_ne!(Value::Uuid(id), Value::Text("not-a-uuid".into()));
    }

    #[test]
    fn test_datetime_text_equality() {
        let now: DateTime<Utc> = "2024-06-01T12:00:00Z".parse().unwrap();
        assert_eq!(Value::DateTime(now), Value::Text("2024-06-01T12:00:00+00:00".into()));
    }

    #[test]
    fn test_bool_int_equality() {
        assert_eq!(Value::Bool(true), Value::Int(1));
        assert_eq!(Value::Bool(false), Value::Int(0));
        assert_ne!(Value::Bool(true), Value::Int(2));
    }

    #[test]
    fn test_json_round_trip() {
        let v = Value::Int(42);
        assert_eq!(Value::from_json(v.into_json()), Value::Int(42));

        let id = Uuid::new_v4();
        let round = Value::from_json(Value::Uuid(id).into_json());
        // comes back as text, still equal under canonical comparison
        assert_eq!(round, Value::Uuid(id));
    }

    #[test]
    fn test_list_builder() {
        let list = Value::list([1i64, 2, 3]);
        assert_eq!(
            list,
            Value::List(vec![Value::Int(1), Value::Int(2), Value::Int(3)])
        );
    }
}
