//! JSON representation of entities and request bodies.

use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};

use super::{Entity, OperationContext};
use crate::model::OperationFailure;

/// Client-supplied key property.
pub const ID_FIELD: &str = "__id";

/// System-maintained fields a client may never write.
pub const RESERVED_FIELDS: [&str; 3] = ["__published", "__updated", "__metadata"];

/// Returns the first reserved field present in a body object.
pub fn reserved_field(body: &Map<String, Value>) -> Option<&'static str> {
    RESERVED_FIELDS
        .iter()
        .copied()
        .find(|field| body.contains_key(*field))
}

/// Like [`reserved_field`], for a raw body. Bodies that are not JSON objects
/// report nothing here; execution reports them as parse errors.
pub fn reserved_field_in_body(body: &[u8]) -> Option<&'static str> {
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => reserved_field(&map),
        _ => None,
    }
}

/// Parses a request body that must be a JSON object.
pub fn parse_object(body: &[u8]) -> Result<Map<String, Value>, OperationFailure> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(OperationFailure::json_parse("request body is empty"));
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(OperationFailure::json_parse("request body must be a JSON object")),
        Err(e) => Err(OperationFailure::json_parse(e)),
    }
}

/// OData v2 date literal, `/Date(<millis>)/`.
pub fn odata_date(at: &DateTime<Utc>) -> String {
    format!("/Date({})/", at.timestamp_millis())
}

/// Renders an entity with its system fields.
pub fn entity_json(ctx: &OperationContext, entity: &Entity) -> Value {
    let mut object = entity.properties.clone();
    object.insert(ID_FIELD.to_string(), Value::String(entity.key.clone()));
    object.insert(
        "__published".to_string(),
        Value::String(odata_date(&entity.published)),
    );
    object.insert(
        "__updated".to_string(),
        Value::String(odata_date(&entity.updated)),
    );
    object.insert(
        "__metadata".to_string(),
        json!({
            "uri": ctx.entity_uri(&entity.entity_set, &entity.key),
            "etag": entity.etag(),
            "type": format!("UserData.{}", entity.entity_set),
        }),
    );
    Value::Object(object)
}

/// Wraps a payload in the OData v2 `{"d": {"results": ...}}` envelope.
pub fn results(value: Value) -> Value {
    json!({ "d": { "results": value } })
}

/// Evaluates an `If-Match` header against the current entity tag.
pub fn if_match_satisfied(header: Option<&str>, current: &str) -> bool {
    match header.map(str::trim) {
        None | Some("*") => true,
        Some(list) => list.split(',').map(str::trim).any(|tag| tag == current),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_reserved_fields() {
        assert_eq!(
            reserved_field_in_body(br#"{"a":1,"__updated":"x"}"#),
            Some("__updated")
        );
        assert_eq!(reserved_field_in_body(br#"{"__metadata":{}}"#), Some("__metadata"));
        assert_eq!(reserved_field_in_body(br#"{"__id":"k","a":1}"#), None);
        assert_eq!(reserved_field_in_body(b"not json"), None);
    }

    #[test]
    fn test_parse_object_rejects_non_objects() {
        assert!(parse_object(br#"{"a":1}"#).is_ok());
        assert_eq!(parse_object(b"").unwrap_err().status, 400);
        assert_eq!(parse_object(b"[1,2]").unwrap_err().status, 400);
        assert_eq!(parse_object(b"{").unwrap_err().status, 400);
    }

    #[test]
    fn test_if_match() {
        assert!(if_match_satisfied(None, "W/\"1-0\""));
        assert!(if_match_satisfied(Some("*"), "W/\"1-0\""));
        assert!(if_match_satisfied(Some("W/\"2-5\", W/\"1-0\""), "W/\"1-0\""));
        assert!(!if_match_satisfied(Some("W/\"2-5\""), "W/\"1-0\""));
    }

    #[test]
    fn test_entity_json_contains_system_fields() {
        let ctx = OperationContext::new("s1", "/stores/s1/odata");
        let mut props = Map::new();
        props.insert("amount".to_string(), json!(3));
        let entity = Entity::new("Sales", "k1", props);

        let value = entity_json(&ctx, &entity);
        assert_eq!(value["__id"], "k1");
        assert_eq!(value["amount"], 3);
        assert_eq!(value["__metadata"]["uri"], "/stores/s1/odata/Sales('k1')");
        assert_eq!(value["__metadata"]["type"], "UserData.Sales");
        assert!(value["__published"].as_str().unwrap().starts_with("/Date("));
    }
}
