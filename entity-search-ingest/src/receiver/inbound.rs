//! Decoding of inbound change events.
//!
//! Two shapes are accepted. The flat shape:
//!
//! ```json
//! {"type": "created", "tenantId": "acme", "entityId": "e-1",
//!  "payload": {"name": "Widget"}, "timestamp": "2024-05-01T10:00:00Z", "version": 3}
//! ```
//!
//! and the event-bus envelope, where the entity fields live under `detail`:
//!
//! ```json
//! {"detail-type": "entity.created", "time": "2024-05-01T10:00:00Z",
//!  "detail": {"tenantId": "acme", "entityId": "e-1", "name": "Widget"}}
//! ```

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use entity_search_shared::{
    ChangeEvent, ChangeEventKind, Payload, ServiceError, TenantGuard, TenantId,
};

const TYPE: &str = "type";
const DETAIL_TYPE: &str = "detail-type";
const DETAIL: &str = "detail";
const TIME: &str = "time";
const TENANT_ID: &str = "tenantId";
const ENTITY_ID: &str = "entityId";
const PAYLOAD: &str = "payload";
const TIMESTAMP: &str = "timestamp";
const VERSION: &str = "version";

/// Keys of an envelope `detail` that are not entity data.
const DETAIL_RESERVED: [&str; 5] = [TENANT_ID, ENTITY_ID, PAYLOAD, TIMESTAMP, VERSION];

/// Decode and validate an inbound event.
///
/// The tenant is checked by [`TenantGuard`] before the entity fields, so an
/// event of a known type without a tenant is `Unauthorized`.
pub fn decode_event(raw: &Value) -> Result<ChangeEvent, ServiceError> {
    let object = raw
        .as_object()
        .ok_or_else(|| ServiceError::invalid_input("Event must be a JSON object"))?;

    match object.get(DETAIL) {
        Some(detail) if object.contains_key(DETAIL_TYPE) => decode_envelope(object, detail),
        _ => decode_flat(object),
    }
}

fn decode_flat(object: &Map<String, Value>) -> Result<ChangeEvent, ServiceError> {
    let kind = parse_kind(object.get(TYPE))?;
    let tenant_id = TenantGuard::authorize(str_field(object, TENANT_ID))?;
    let entity_id = required_str(object, ENTITY_ID)?;
    let payload = match object.get(PAYLOAD) {
        _ if kind == ChangeEventKind::Deleted => None,
        None | Some(Value::Null) => None,
        Some(value) => Some(Payload::try_from(value.clone())?),
    };
    let timestamp = parse_timestamp(object.get(TIMESTAMP))?;

    finish(kind, tenant_id, entity_id, payload, timestamp, object.get(VERSION))
}

fn decode_envelope(
    envelope: &Map<String, Value>,
    detail: &Value,
) -> Result<ChangeEvent, ServiceError> {
    let kind = parse_kind(envelope.get(DETAIL_TYPE))?;
    let detail = detail
        .as_object()
        .ok_or_else(|| ServiceError::invalid_input("Event detail must be a JSON object"))?;
    let tenant_id = TenantGuard::authorize(str_field(detail, TENANT_ID))?;
    let entity_id = required_str(detail, ENTITY_ID)?;

    // The entity fields travel inline next to the ids unless wrapped in `payload`.
    let payload = match detail.get(PAYLOAD) {
        _ if kind == ChangeEventKind::Deleted => None,
        Some(Value::Null) => None,
        Some(value) => Some(Payload::try_from(value.clone())?),
        None => {
            let inline: Map<String, Value> = detail
                .iter()
                .filter(|(key, _)| !DETAIL_RESERVED.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            Some(Payload::try_from(Value::Object(inline))?)
        }
    };
    let timestamp = parse_timestamp(detail.get(TIMESTAMP).or_else(|| envelope.get(TIME)))?;

    finish(kind, tenant_id, entity_id, payload, timestamp, detail.get(VERSION))
}

fn finish(
    kind: ChangeEventKind,
    tenant_id: TenantId,
    entity_id: &str,
    payload: Option<Payload>,
    timestamp: DateTime<Utc>,
    version: Option<&Value>,
) -> Result<ChangeEvent, ServiceError> {
    let event = match kind {
        ChangeEventKind::Created | ChangeEventKind::Updated => {
            let payload = payload.ok_or_else(|| {
                ServiceError::invalid_input(format!("payload is required for {} events", kind))
            })?;
            ChangeEvent {
                kind,
                ..ChangeEvent::created(tenant_id, entity_id, payload, timestamp)
            }
        }
        ChangeEventKind::Deleted => ChangeEvent::deleted(tenant_id, entity_id, timestamp),
    };

    match version {
        None | Some(Value::Null) => Ok(event),
        Some(value) => {
            let version = value
                .as_i64()
                .ok_or_else(|| ServiceError::invalid_input("version must be an integer"))?;
            Ok(event.with_version(version))
        }
    }
}

fn parse_kind(raw: Option<&Value>) -> Result<ChangeEventKind, ServiceError> {
    match raw {
        Some(Value::String(s)) => s.parse(),
        Some(other) => Err(ServiceError::invalid_input(format!("Unknown event type: {}", other))),
        None => Err(ServiceError::invalid_input("Unknown event type: <missing>")),
    }
}

fn str_field<'a>(object: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

fn required_str<'a>(object: &'a Map<String, Value>, key: &str) -> Result<&'a str, ServiceError> {
    match str_field(object, key).map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ServiceError::invalid_input(format!("{} is required", key))),
    }
}

/// Accepts RFC 3339 strings and integer epoch milliseconds.
fn parse_timestamp(raw: Option<&Value>) -> Result<DateTime<Utc>, ServiceError> {
    let invalid =
        || ServiceError::invalid_input("timestamp must be RFC 3339 or epoch milliseconds");
    match raw {
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|ts| ts.with_timezone(&Utc))
            .map_err(|_| invalid()),
        Some(Value::Number(n)) => n
            .as_i64()
            .and_then(|millis| Utc.timestamp_millis_opt(millis).single())
            .ok_or_else(invalid),
        Some(Value::Null) | None => Err(ServiceError::invalid_input("timestamp is required")),
        Some(_) => Err(invalid()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entity_search_shared::FieldValue;
    use serde_json::json;

    #[test]
    fn test_decode_flat_created() {
        let event = decode_event(&json!({
            "type": "created",
            "tenantId": "acme",
            "entityId": "e-1",
            "payload": {"name": "Widget", "price": 10},
            "timestamp": "2024-05-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(event.kind, ChangeEventKind::Created);
        assert_eq!(event.tenant_id.as_str(), "acme");
        assert_eq!(event.entity_id, "e-1");
        assert_eq!(event.version, 1_714_557_600_000);
        let payload = event.payload.unwrap();
        assert_eq!(payload.get("price"), Some(&FieldValue::Integer(10)));
    }

    #[test]
    fn test_decode_explicit_version_and_millis_timestamp() {
        let event = decode_event(&json!({
            "type": "deleted",
            "tenantId": "acme",
            "entityId": "e-1",
            "timestamp": 1_714_557_600_000_i64,
            "version": 7
        }))
        .unwrap();

        assert_eq!(event.kind, ChangeEventKind::Deleted);
        assert_eq!(event.version, 7);
        assert_eq!(event.timestamp.timestamp(), 1_714_557_600);
        assert!(event.payload.is_none());
    }

    #[test]
    fn test_decode_envelope_with_inline_fields() {
        let event = decode_event(&json!({
            "detail-type": "entity.updated",
            "time": "2024-05-01T10:00:00Z",
            "detail": {"tenantId": "acme", "entityId": "e-1", "name": "Widget", "status": "active"}
        }))
        .unwrap();

        assert_eq!(event.kind, ChangeEventKind::Updated);
        let payload = event.payload.unwrap();
        assert_eq!(payload.len(), 2);
        assert!(payload.get("tenantId").is_none());
        assert_eq!(payload.get("status"), Some(&FieldValue::from("active")));
    }

    #[test]
    fn test_delete_ignores_payload() {
        let flat = decode_event(&json!({
            "type": "deleted",
            "tenantId": "acme",
            "entityId": "e-1",
            "payload": "gone",
            "timestamp": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(flat.kind, ChangeEventKind::Deleted);
        assert!(flat.payload.is_none());

        let envelope = decode_event(&json!({
            "detail-type": "entity.deleted",
            "time": "2024-05-01T10:00:00Z",
            "detail": {"tenantId": "acme", "entityId": "e-1", "matrix": [[1, 2]]}
        }))
        .unwrap();
        assert_eq!(envelope.kind, ChangeEventKind::Deleted);
        assert_eq!(envelope.entity_id, "e-1");
        assert!(envelope.payload.is_none());
    }

    #[test]
    fn test_missing_tenant_is_unauthorized() {
        let err = decode_event(&json!({
            "type": "created",
            "entityId": "e-1",
            "payload": {},
            "timestamp": "2024-05-01T10:00:00Z"
        }))
        .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        let err = decode_event(&json!({
            "detail-type": "entity.deleted",
            "time": "2024-05-01T10:00:00Z",
            "detail": {"tenantId": "  ", "entityId": "e-1"}
        }))
        .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[test]
    fn test_unknown_type_is_invalid_input() {
        let err = decode_event(&json!({
            "type": "archived",
            "tenantId": "acme",
            "entityId": "e-1",
            "timestamp": "2024-05-01T10:00:00Z"
        }))
        .unwrap_err();
        assert_eq!(err, ServiceError::invalid_input("Unknown event type: archived"));
    }

    #[test]
    fn test_validation_errors() {
        let missing_entity = json!({"type": "deleted", "tenantId": "acme", "timestamp": 1});
        assert_eq!(
            decode_event(&missing_entity).unwrap_err(),
            ServiceError::invalid_input("entityId is required")
        );

        let missing_payload = json!({
            "type": "updated", "tenantId": "acme", "entityId": "e-1", "timestamp": 1
        });
        assert_eq!(
            decode_event(&missing_payload).unwrap_err(),
            ServiceError::invalid_input("payload is required for updated events")
        );

        let bad_timestamp = json!({
            "type": "deleted", "tenantId": "acme", "entityId": "e-1", "timestamp": "yesterday"
        });
        assert!(matches!(decode_event(&bad_timestamp).unwrap_err(), ServiceError::InvalidInput(_)));

        let missing_timestamp = json!({"type": "deleted", "tenantId": "acme", "entityId": "e-1"});
        assert_eq!(
            decode_event(&missing_timestamp).unwrap_err(),
            ServiceError::invalid_input("timestamp is required")
        );

        assert!(matches!(decode_event(&json!([1, 2])).unwrap_err(), ServiceError::InvalidInput(_)));
    }
}
