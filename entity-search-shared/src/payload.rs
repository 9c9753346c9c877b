//! Typed entity payloads.
//!
//! Payloads arrive as arbitrary JSON objects. They are converted once at the
//! boundary into a flat mapping of dotted field paths to typed values, so the
//! core never handles untyped dictionaries.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::errors::ServiceError;

/// A single typed payload value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "Value")]
pub enum FieldValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    /// A list of scalar values. Nested lists are not allowed.
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// Convert a JSON scalar into a field value.
    pub fn scalar_from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Self::Integer(i)),
                None => n.as_f64().map(Self::Float),
            },
            Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    /// Whether this value is a scalar (not a list).
    pub fn is_scalar(&self) -> bool {
        !matches!(self, Self::List(_))
    }

    /// Numeric view of the value, if it is a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Integer(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Compare two scalar values of compatible type.
    ///
    /// Numbers compare numerically regardless of integer/float
    /// representation, text compares lexicographically and booleans compare
    /// with `false < true`. Mismatched types are incomparable.
    pub fn compare(&self, other: &FieldValue) -> Option<Ordering> {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            _ => match (self.as_f64(), other.as_f64()) {
                (Some(a), Some(b)) => a.partial_cmp(&b),
                _ => None,
            },
        }
    }

    /// The JSON representation of this value.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => Value::Bool(*b),
            Self::Integer(i) => Value::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            Self::Text(s) => Value::String(s.clone()),
            Self::List(items) => Value::Array(items.iter().map(FieldValue::to_json).collect()),
        }
    }
}

impl TryFrom<Value> for FieldValue {
    type Error = ServiceError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        if let Some(scalar) = Self::scalar_from_json(&value) {
            return Ok(scalar);
        }
        match value {
            Value::Array(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items.iter().filter(|item| !item.is_null()) {
                    let scalar = Self::scalar_from_json(item).ok_or_else(|| {
                        ServiceError::invalid_input("list values must be scalars")
                    })?;
                    values.push(scalar);
                }
                Ok(Self::List(values))
            }
            Value::Null => Err(ServiceError::invalid_input("null is not a field value")),
            _ => Err(ServiceError::invalid_input(
                "objects are not allowed as field values",
            )),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Integer(i) => serializer.serialize_i64(*i),
            Self::Float(f) => serializer.serialize_f64(*f),
            Self::Text(s) => serializer.serialize_str(s),
            Self::List(items) => items.serialize(serializer),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A flat, typed entity payload keyed by dotted field path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct Payload(BTreeMap<String, FieldValue>);

impl Payload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field, returning the payload for chaining.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.0.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.0.get(field)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FieldValue)> {
        self.0.iter()
    }

    /// All text values, including text elements of lists.
    pub fn text_values(&self) -> impl Iterator<Item = &str> {
        self.0.values().flat_map(|value| {
            let items: Vec<&str> = match value {
                FieldValue::Text(s) => vec![s.as_str()],
                FieldValue::List(items) => items
                    .iter()
                    .filter_map(|item| match item {
                        FieldValue::Text(s) => Some(s.as_str()),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };
            items
        })
    }

    /// The JSON object representation, keyed by dotted path.
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .0
            .iter()
            .map(|(key, value)| (key.clone(), value.to_json()))
            .collect();
        Value::Object(map)
    }

    fn flatten_into(
        prefix: &str,
        object: Map<String, Value>,
        out: &mut BTreeMap<String, FieldValue>,
    ) -> Result<(), ServiceError> {
        for (key, value) in object {
            if key.trim().is_empty() {
                return Err(ServiceError::invalid_input("payload keys must not be empty"));
            }
            let path = if prefix.is_empty() {
                key
            } else {
                format!("{}.{}", prefix, key)
            };
            match value {
                Value::Null => continue,
                Value::Object(inner) => Self::flatten_into(&path, inner, out)?,
                other => {
                    let field = FieldValue::try_from(other).map_err(|e| {
                        let msg = format!("payload field '{}': {}", path, e.message());
                        ServiceError::invalid_input(msg)
                    })?;
                    if out.contains_key(&path) {
                        return Err(ServiceError::invalid_input(format!(
                            "payload field '{}' is given more than once",
                            path
                        )));
                    }
                    out.insert(path, field);
                }
            }
        }
        Ok(())
    }
}

impl TryFrom<Value> for Payload {
    type Error = ServiceError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(object) => {
                let mut fields = BTreeMap::new();
                Self::flatten_into("", object, &mut fields)?;
                Ok(Self(fields))
            }
            _ => Err(ServiceError::invalid_input("payload must be a JSON object")),
        }
    }
}

impl FromIterator<(String, FieldValue)> for Payload {
    fn from_iter<T: IntoIterator<Item = (String, FieldValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_payload_flattens_nested_objects() {
        let payload = Payload::try_from(json!({
            "name": "Acme",
            "address": { "city": "Berlin", "zip": 10115 }
        }))
        .unwrap();

        assert_eq!(payload.get("name"), Some(&FieldValue::from("Acme")));
        assert_eq!(payload.get("address.city"), Some(&FieldValue::from("Berlin")));
        assert_eq!(payload.get("address.zip"), Some(&FieldValue::Integer(10115)));
        assert_eq!(payload.len(), 3);
    }

    #[test]
    fn test_payload_drops_nulls() {
        let payload = Payload::try_from(json!({ "name": "Acme", "note": null })).unwrap();
        assert!(payload.get("note").is_none());
        assert_eq!(payload.len(), 1);
    }

    #[test]
    fn test_payload_keeps_scalar_lists() {
        let payload = Payload::try_from(json!({ "tags": ["a", "b", null] })).unwrap();
        assert_eq!(
            payload.get("tags"),
            Some(&FieldValue::List(vec!["a".into(), "b".into()]))
        );
    }

    #[test]
    fn test_payload_rejects_nested_lists() {
        let err = Payload::try_from(json!({ "matrix": [[1, 2]] })).unwrap_err();
        assert!(matches!(err, ServiceError::InvalidInput(_)));
        assert!(err.message().contains("matrix"));
    }

    #[test]
    fn test_payload_rejects_colliding_paths() {
        let err = Payload::try_from(json!({ "a.b": 1, "a": { "b": 2 } })).unwrap_err();
        assert_eq!(
            err,
            ServiceError::invalid_input("payload field 'a.b' is given more than once")
        );

        let payload = Payload::try_from(json!({ "a.b": 1, "a": { "c": 2 } })).unwrap();
        assert_eq!(payload.len(), 2);
    }

    #[test]
    fn test_payload_rejects_non_object() {
        assert!(Payload::try_from(json!("text")).is_err());
        assert!(Payload::try_from(json!([1, 2])).is_err());
    }

    #[test]
    fn test_payload_deserializes_through_serde() {
        let payload: Payload = serde_json::from_value(json!({ "score": 1.5 })).unwrap();
        assert_eq!(payload.get("score"), Some(&FieldValue::Float(1.5)));
    }

    #[test]
    fn test_payload_serializes_flat() {
        let payload = Payload::new().with("a.b", "x").with("n", 2i64);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value, json!({ "a.b": "x", "n": 2 }));
    }

    #[test]
    fn test_text_values_include_list_elements() {
        let payload = Payload::try_from(json!({
            "name": "Acme",
            "tags": ["red", 3],
            "count": 4
        }))
        .unwrap();
        let mut texts: Vec<&str> = payload.text_values().collect();
        texts.sort();
        assert_eq!(texts, vec!["Acme", "red"]);
    }

    #[test]
    fn test_compare_mixed_numbers() {
        let a = FieldValue::Integer(2);
        let b = FieldValue::Float(2.5);
        assert_eq!(a.compare(&b), Some(Ordering::Less));
        assert_eq!(FieldValue::from("x").compare(&a), None);
    }
}
