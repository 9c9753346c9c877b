//! Structured search filters.
//!
//! A filter set maps payload field paths to conditions. All conditions must
//! hold for a document to match. The JSON shape of each filter value selects
//! the condition kind: a scalar is an exact match, an array is an any-of
//! match, and an object with `gt`/`gte`/`lt`/`lte` keys is a range.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::errors::ServiceError;
use crate::payload::{FieldValue, Payload};

const RANGE_KEYS: [&str; 4] = ["gt", "gte", "lt", "lte"];

/// Check that a field path only uses `[A-Za-z0-9_.-]` and has no empty segments.
pub fn validate_field_name(field: &str) -> Result<(), ServiceError> {
    let valid_chars = field
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'));
    if field.is_empty() || !valid_chars || field.split('.').any(str::is_empty) {
        return Err(ServiceError::invalid_input(format!(
            "invalid filter field name '{}'",
            field
        )));
    }
    Ok(())
}

/// Bounds of a range filter. At least one bound is set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeBounds {
    pub gt: Option<FieldValue>,
    pub gte: Option<FieldValue>,
    pub lt: Option<FieldValue>,
    pub lte: Option<FieldValue>,
}

impl RangeBounds {
    /// Whether `value` lies within every configured bound.
    pub fn contains(&self, value: &FieldValue) -> bool {
        let check = |bound: &Option<FieldValue>, accept: fn(Ordering) -> bool| match bound {
            Some(bound) => value.compare(bound).map(accept).unwrap_or(false),
            None => true,
        };
        check(&self.gt, |o| o == Ordering::Greater)
            && check(&self.gte, |o| o != Ordering::Less)
            && check(&self.lt, |o| o == Ordering::Less)
            && check(&self.lte, |o| o != Ordering::Greater)
    }

    fn bounds(&self) -> impl Iterator<Item = (&'static str, &FieldValue)> {
        RANGE_KEYS
            .into_iter()
            .zip([&self.gt, &self.gte, &self.lt, &self.lte])
            .filter_map(|(key, bound)| bound.as_ref().map(|b| (key, b)))
    }
}

/// A single filter condition on one field.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterCondition {
    /// The field equals the value.
    Exact(FieldValue),
    /// The field equals one of the values.
    AnyOf(Vec<FieldValue>),
    /// The field lies within the bounds.
    Range(RangeBounds),
}

impl FilterCondition {
    /// Evaluate the condition against a payload value.
    ///
    /// List values match when any element matches.
    pub fn matches(&self, value: Option<&FieldValue>) -> bool {
        match value {
            None => false,
            Some(FieldValue::List(items)) => items.iter().any(|item| self.matches_scalar(item)),
            Some(scalar) => self.matches_scalar(scalar),
        }
    }

    fn matches_scalar(&self, value: &FieldValue) -> bool {
        let equals = |expected: &FieldValue| value.compare(expected) == Some(Ordering::Equal);
        match self {
            Self::Exact(expected) => equals(expected),
            Self::AnyOf(options) => options.iter().any(equals),
            Self::Range(bounds) => bounds.contains(value),
        }
    }

    fn range_from_object(object: serde_json::Map<String, Value>) -> Result<Self, ServiceError> {
        if object.is_empty() {
            return Err(ServiceError::invalid_input(
                "range filter needs at least one of gt, gte, lt, lte",
            ));
        }
        let mut bounds = RangeBounds::default();
        for (key, raw) in object {
            let bound = match FieldValue::scalar_from_json(&raw) {
                Some(value @ (FieldValue::Integer(_) | FieldValue::Float(_) | FieldValue::Text(_))) => {
                    value
                }
                _ => {
                    return Err(ServiceError::invalid_input(format!(
                        "range bound '{}' must be a number or string",
                        key
                    )))
                }
            };
            match key.as_str() {
                "gt" => bounds.gt = Some(bound),
                "gte" => bounds.gte = Some(bound),
                "lt" => bounds.lt = Some(bound),
                "lte" => bounds.lte = Some(bound),
                other => {
                    return Err(ServiceError::invalid_input(format!(
                        "unknown range operator '{}'",
                        other
                    )))
                }
            }
        }
        {
            let mut kinds = bounds.bounds().map(|(_, bound)| bound.as_f64().is_some());
            let numeric = kinds.next().unwrap_or(true);
            if kinds.any(|is_numeric| is_numeric != numeric) {
                return Err(ServiceError::invalid_input(
                    "range bounds must be all numbers or all strings",
                ));
            }
        }
        Ok(Self::Range(bounds))
    }
}

impl TryFrom<Value> for FilterCondition {
    type Error = ServiceError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        if let Some(scalar) = FieldValue::scalar_from_json(&value) {
            return Ok(Self::Exact(scalar));
        }
        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    return Err(ServiceError::invalid_input("filter list must not be empty"));
                }
                items
                    .iter()
                    .map(|item| {
                        FieldValue::scalar_from_json(item).ok_or_else(|| {
                            ServiceError::invalid_input("filter list values must be scalars")
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()
                    .map(Self::AnyOf)
            }
            Value::Object(object) => Self::range_from_object(object),
            _ => Err(ServiceError::invalid_input("filter value must not be null")),
        }
    }
}

impl Serialize for FilterCondition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Exact(value) => value.serialize(serializer),
            Self::AnyOf(values) => values.serialize(serializer),
            Self::Range(bounds) => {
                let mut map = serializer.serialize_map(None)?;
                for (key, bound) in bounds.bounds() {
                    map.serialize_entry(key, bound)?;
                }
                map.end()
            }
        }
    }
}

/// Conjunctive set of filters keyed by field path.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value")]
pub struct FilterSet(BTreeMap<String, FilterCondition>);

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a condition after validating the field name.
    pub fn with(
        mut self,
        field: impl Into<String>,
        condition: FilterCondition,
    ) -> Result<Self, ServiceError> {
        let field = field.into();
        validate_field_name(&field)?;
        self.0.insert(field, condition);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &FilterCondition)> {
        self.0.iter()
    }

    /// Whether every condition holds for the payload.
    pub fn matches(&self, payload: &Payload) -> bool {
        self.0
            .iter()
            .all(|(field, condition)| condition.matches(payload.get(field)))
    }
}

impl TryFrom<Value> for FilterSet {
    type Error = ServiceError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Null => Ok(Self::default()),
            Value::Object(object) => {
                let mut filters = BTreeMap::new();
                for (field, raw) in object {
                    validate_field_name(&field)?;
                    let condition = FilterCondition::try_from(raw).map_err(|e| {
                        ServiceError::invalid_input(format!("filter '{}': {}", field, e.message()))
                    })?;
                    filters.insert(field, condition);
                }
                Ok(Self(filters))
            }
            _ => Err(ServiceError::invalid_input("filters must be a JSON object")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload() -> Payload {
        Payload::try_from(json!({
            "status": "active",
            "employees": 42,
            "rating": 4.5,
            "tags": ["b2b", "saas"],
            "address": { "country": "DE" }
        }))
        .unwrap()
    }

    #[test]
    fn test_exact_filter() {
        let filters = FilterSet::try_from(json!({ "status": "active" })).unwrap();
        assert!(filters.matches(&payload()));

        let filters = FilterSet::try_from(json!({ "status": "inactive" })).unwrap();
        assert!(!filters.matches(&payload()));
    }

    #[test]
    fn test_exact_filter_on_numbers_ignores_representation() {
        let filters = FilterSet::try_from(json!({ "employees": 42.0 })).unwrap();
        assert!(filters.matches(&payload()));
    }

    #[test]
    fn test_any_of_filter() {
        let filters = FilterSet::try_from(json!({ "status": ["pending", "active"] })).unwrap();
        assert!(filters.matches(&payload()));
    }

    #[test]
    fn test_list_field_matches_any_element() {
        let filters = FilterSet::try_from(json!({ "tags": "saas" })).unwrap();
        assert!(filters.matches(&payload()));
    }

    #[test]
    fn test_range_filter() {
        let filters = FilterSet::try_from(json!({ "employees": { "gte": 10, "lt": 50 } })).unwrap();
        assert!(filters.matches(&payload()));

        let filters = FilterSet::try_from(json!({ "employees": { "gt": 42 } })).unwrap();
        assert!(!filters.matches(&payload()));
    }

    #[test]
    fn test_range_bounds_must_share_a_type() {
        let err = FilterSet::try_from(json!({ "code": { "gte": 1, "lt": "m" } })).unwrap_err();
        assert_eq!(
            err,
            ServiceError::invalid_input(
                "filter 'code': range bounds must be all numbers or all strings"
            )
        );

        assert!(FilterSet::try_from(json!({ "n": { "gte": 1, "lt": 2.5 } })).is_ok());
        assert!(FilterSet::try_from(json!({ "code": { "gte": "a", "lt": "m" } })).is_ok());
    }

    #[test]
    fn test_filters_are_conjunctive() {
        let filters = FilterSet::try_from(json!({
            "status": "active",
            "address.country": "FR"
        }))
        .unwrap();
        assert!(!filters.matches(&payload()));
    }

    #[test]
    fn test_missing_field_does_not_match() {
        let filters = FilterSet::try_from(json!({ "region": "eu" })).unwrap();
        assert!(!filters.matches(&payload()));
    }

    #[test]
    fn test_null_filters_are_empty() {
        let filters = FilterSet::try_from(Value::Null).unwrap();
        assert!(filters.is_empty());
        assert!(filters.matches(&payload()));
    }

    #[test]
    fn test_rejects_malformed_filters() {
        assert!(FilterSet::try_from(json!(["status"])).is_err());
        assert!(FilterSet::try_from(json!({ "status": null })).is_err());
        assert!(FilterSet::try_from(json!({ "status": [] })).is_err());
        assert!(FilterSet::try_from(json!({ "n": { "between": 1 } })).is_err());
        assert!(FilterSet::try_from(json!({ "n": {} })).is_err());
        assert!(FilterSet::try_from(json!({ "n": { "gt": true } })).is_err());
        assert!(FilterSet::try_from(json!({ "n": { "gte": 1, "lt": "m" } })).is_err());
        assert!(FilterSet::try_from(json!({ "bad field": 1 })).is_err());
        assert!(FilterSet::try_from(json!({ "a..b": 1 })).is_err());
    }

    #[test]
    fn test_filters_serialize_back_to_input_shape() {
        let input = json!({
            "employees": { "gte": 10, "lt": 50 },
            "status": ["a", "b"],
            "verified": true
        });
        let filters = FilterSet::try_from(input.clone()).unwrap();
        assert_eq!(serde_json::to_value(&filters).unwrap(), input);
    }
}
