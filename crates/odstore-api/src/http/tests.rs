//! HTTP API tests against the router with in-memory storage.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use odstore_storage::{DataStore, EntityTypeDefinition, MemoryDataStore};

use super::routes::create_router;
use super::state::AppState;
use crate::middleware::REQUEST_ID_HEADER;

const STORE: &str = "s1";

fn test_app(storage: &Arc<MemoryDataStore>) -> Router {
    create_router(AppState::new(Arc::clone(storage)))
}

/// A store `s1` with `Sales` navigating to `SalesDetail`.
async fn seeded_storage() -> Arc<MemoryDataStore> {
    let storage = Arc::new(MemoryDataStore::new());
    storage.create_store(STORE, "Test Store").await.unwrap();
    for (name, targets) in [("SalesDetail", vec![]), ("Sales", vec!["SalesDetail"])] {
        storage
            .create_entity_type(
                STORE,
                EntityTypeDefinition {
                    name: name.to_string(),
                    navigation_targets: targets.into_iter().map(String::from).collect(),
                },
            )
            .await
            .unwrap();
    }
    storage
}

async fn send(
    app: Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: impl Into<Body>,
) -> (StatusCode, HeaderMap, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        builder = builder.header(*name, *value);
    }
    let response = app.oneshot(builder.body(body.into()).unwrap()).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body.to_vec())
}

async fn send_json(app: Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
    let (status, _, bytes) = send(
        app,
        method,
        uri,
        &[("content-type", "application/json")],
        body.to_string(),
    )
    .await;
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

// ============================================================
// Health
// ============================================================

#[tokio::test]
async fn test_health_and_ready() {
    let storage = Arc::new(MemoryDataStore::new());

    let (status, _, body) = send(test_app(&storage), "GET", "/health", &[], Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["status"], "ok");

    let (status, _, body) = send(test_app(&storage), "GET", "/ready", &[], Body::empty()).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["checks"]["storage"], "ok");
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let storage = Arc::new(MemoryDataStore::new());
    let (_, headers, _) = send(
        test_app(&storage),
        "GET",
        "/health",
        &[(REQUEST_ID_HEADER, "abc-123")],
        Body::empty(),
    )
    .await;
    assert_eq!(headers.get(REQUEST_ID_HEADER).unwrap(), "abc-123");
}

#[tokio::test]
async fn test_batch_preflight_is_allowed() {
    let storage = seeded_storage().await;
    let (status, headers, _) = send(
        test_app(&storage),
        "OPTIONS",
        &format!("/stores/{STORE}/odata/$batch"),
        &[
            ("origin", "http://example.com"),
            ("access-control-request-method", "POST"),
        ],
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers.contains_key("access-control-allow-origin"));
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let storage = Arc::new(MemoryDataStore::new());
    let (status, json) = send_json(test_app(&storage), "GET", "/nope", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "route_not_found");
}

// ============================================================
// Stores and entity types
// ============================================================

#[tokio::test]
async fn test_store_lifecycle() {
    let storage = Arc::new(MemoryDataStore::new());

    let (status, created) =
        send_json(test_app(&storage), "POST", "/stores", json!({"name": "Sales DB"})).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();
    assert_eq!(id.len(), 26, "generated ids are ULIDs");

    let (status, fetched) =
        send_json(test_app(&storage), "GET", &format!("/stores/{id}"), Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["name"], "Sales DB");

    let (status, listed) = send_json(test_app(&storage), "GET", "/stores", Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed["stores"].as_array().unwrap().len(), 1);

    let (status, _) =
        send_json(test_app(&storage), "DELETE", &format!("/stores/{id}"), Value::Null).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, json) =
        send_json(test_app(&storage), "GET", &format!("/stores/{id}"), Value::Null).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "store_not_found");
}

#[tokio::test]
async fn test_duplicate_store_id_is_conflict() {
    let storage = Arc::new(MemoryDataStore::new());
    let body = json!({"id": "tenant-a", "name": "A"});

    let (status, _) = send_json(test_app(&storage), "POST", "/stores", body.clone()).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, json) = send_json(test_app(&storage), "POST", "/stores", body).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "already_exists");
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let storage = Arc::new(MemoryDataStore::new());
    let (status, _, body) = send(
        test_app(&storage),
        "POST",
        "/stores",
        &[("content-type", "application/json")],
        "{not json",
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "validation_error");
}

#[tokio::test]
async fn test_entity_types_record_navigation_on_both_sides() {
    let storage = Arc::new(MemoryDataStore::new());
    storage.create_store(STORE, "Test").await.unwrap();
    let uri = format!("/stores/{STORE}/entity-types");

    let (status, _) = send_json(test_app(&storage), "POST", &uri, json!({"name": "Supplier"})).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, created) = send_json(
        test_app(&storage),
        "POST",
        &uri,
        json!({"name": "Product", "navigation_targets": ["Supplier"]}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["navigation_targets"], json!(["Supplier"]));

    let (status, listed) = send_json(test_app(&storage), "GET", &uri, Value::Null).await;
    assert_eq!(status, StatusCode::OK);
    let supplier = listed["entity_types"]
        .as_array()
        .unwrap()
        .iter()
        .find(|t| t["name"] == "Supplier")
        .unwrap();
    assert_eq!(supplier["navigation_targets"], json!(["Product"]));
}

#[tokio::test]
async fn test_entity_type_with_unknown_target_is_not_found() {
    let storage = Arc::new(MemoryDataStore::new());
    storage.create_store(STORE, "Test").await.unwrap();

    let (status, json) = send_json(
        test_app(&storage),
        "POST",
        &format!("/stores/{STORE}/entity-types"),
        json!({"name": "Product", "navigation_targets": ["Ghost"]}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "entity_type_not_found");
}

// ============================================================
// Single OData resource requests
// ============================================================

#[tokio::test]
async fn test_single_create_read_update_delete() {
    let storage = seeded_storage().await;
    let base = format!("/stores/{STORE}/odata");

    let (status, headers, body) = send(
        test_app(&storage),
        "POST",
        &format!("{base}/Sales"),
        &[("content-type", "application/json")],
        r#"{"__id":"k1","amount":10}"#,
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        headers.get("location").unwrap(),
        "/stores/s1/odata/Sales('k1')"
    );
    let created: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(created["d"]["results"]["__id"], "k1");
    assert_eq!(created["d"]["results"]["amount"], 10);

    let (status, headers, body) = send(
        test_app(&storage),
        "GET",
        &format!("{base}/Sales('k1')"),
        &[],
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let etag = headers.get("etag").unwrap().to_str().unwrap().to_string();
    let read: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(read["d"]["results"]["amount"], 10);

    let (status, _, _) = send(
        test_app(&storage),
        "PUT",
        &format!("{base}/Sales('k1')"),
        &[("content-type", "application/json"), ("if-match", etag.as_str())],
        r#"{"amount":20}"#,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        storage.get_entity(STORE, "Sales", "k1").await.unwrap().properties["amount"],
        20
    );

    // The old tag no longer matches.
    let (status, _, body) = send(
        test_app(&storage),
        "DELETE",
        &format!("{base}/Sales('k1')"),
        &[("if-match", etag.as_str())],
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::PRECONDITION_FAILED);
    let failure: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(failure["code"], "ETAG_NOT_MATCH");

    let (status, _, _) = send(
        test_app(&storage),
        "DELETE",
        &format!("{base}/Sales('k1')"),
        &[],
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert!(storage.get_entity(STORE, "Sales", "k1").await.is_err());
}

#[tokio::test]
async fn test_single_collection_read_honours_top_and_skip() {
    let storage = seeded_storage().await;
    for key in ["a", "b", "c", "d"] {
        let (status, _, _) = send(
            test_app(&storage),
            "POST",
            &format!("/stores/{STORE}/odata/Sales"),
            &[("content-type", "application/json")],
            format!(r#"{{"__id":"{key}"}}"#),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (status, _, body) = send(
        test_app(&storage),
        "GET",
        &format!("/stores/{STORE}/odata/Sales?$top=2&$skip=1"),
        &[],
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_slice(&body).unwrap();
    let keys: Vec<&str> = json["d"]["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["__id"].as_str().unwrap())
        .collect();
    assert_eq!(keys, vec!["b", "c"]);
}

#[tokio::test]
async fn test_single_request_failures_use_odata_error_format() {
    let storage = seeded_storage().await;

    let cases = [
        ("GET", "Sales('missing')", StatusCode::NOT_FOUND, "NO_SUCH_ENTITY"),
        ("GET", "Nothing", StatusCode::NOT_FOUND, "NO_SUCH_ENTITY_SET"),
        ("DELETE", "Sales", StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED"),
        ("PATCH", "Sales('k')", StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED"),
    ];

    for (method, path, expected_status, expected_code) in cases {
        let (status, _, body) = send(
            test_app(&storage),
            method,
            &format!("/stores/{STORE}/odata/{path}"),
            &[],
            Body::empty(),
        )
        .await;
        assert_eq!(status, expected_status, "{method} {path}");
        let json: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["code"], expected_code, "{method} {path}");
        assert_eq!(json["message"]["lang"], "en");
    }
}

#[tokio::test]
async fn test_reserved_field_in_create_is_rejected() {
    let storage = seeded_storage().await;
    let (status, _, body) = send(
        test_app(&storage),
        "POST",
        &format!("/stores/{STORE}/odata/Sales"),
        &[("content-type", "application/json")],
        r#"{"__id":"k","__updated":"/Date(0)/"}"#,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["code"], "REQUEST_FIELD_FORMAT_ERROR");
}

// ============================================================
// $batch
// ============================================================

#[tokio::test]
async fn test_batch_round_trip() {
    let storage = seeded_storage().await;
    let body = "--b1\r\n\
Content-Type: application/http\r\n\
\r\n\
POST Sales HTTP/1.1\r\n\
Content-Type: application/json\r\n\
\r\n\
{\"__id\":\"k1\"}\r\n\
--b1\r\n\
Content-Type: application/http\r\n\
\r\n\
GET Sales('k1') HTTP/1.1\r\n\
\r\n\
\r\n\
--b1--";

    let (status, headers, bytes) = send(
        test_app(&storage),
        "POST",
        &format!("/stores/{STORE}/odata/$batch"),
        &[("content-type", "multipart/mixed; boundary=b1")],
        body,
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(
        headers.get("content-type").unwrap(),
        "multipart/mixed; boundary=b1"
    );
    assert_eq!(headers.get("dataserviceversion").unwrap(), "2.0");

    let text = String::from_utf8(bytes).unwrap();
    let created = text.find("HTTP/1.1 201 Created").unwrap();
    let read = text.find("HTTP/1.1 200 OK").unwrap();
    assert!(created < read, "parts keep request order:\n{text}");
    assert!(text.ends_with("--b1--"));
}

#[tokio::test]
async fn test_batch_without_boundary_is_rejected() {
    let storage = seeded_storage().await;
    let (status, _, bytes) = send(
        test_app(&storage),
        "POST",
        &format!("/stores/{STORE}/odata/$batch"),
        &[("content-type", "multipart/mixed")],
        "--b1--",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["code"], "BATCH_BODY_FORMAT_HEADER_ERROR");
}

#[tokio::test]
async fn test_batch_requires_post() {
    let storage = seeded_storage().await;
    let (status, _, bytes) = send(
        test_app(&storage),
        "GET",
        &format!("/stores/{STORE}/odata/$batch"),
        &[],
        Body::empty(),
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["code"], "METHOD_NOT_ALLOWED");
}

#[tokio::test]
async fn test_batch_against_unknown_store_is_not_found() {
    let storage = seeded_storage().await;
    let (status, _, bytes) = send(
        test_app(&storage),
        "POST",
        "/stores/ghost/odata/$batch",
        &[("content-type", "multipart/mixed; boundary=b1")],
        "--b1\nContent-Type: application/http\n\nGET Sales\n\n--b1--",
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let json: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(json["code"], "store_not_found");
}

#[tokio::test]
async fn test_batch_body_limit_is_configurable() {
    let storage = seeded_storage().await;
    let mut state = AppState::new(Arc::clone(&storage));
    state.batch_body_limit = 64;
    let app = create_router(state);

    let body = format!(
        "--b1\nContent-Type: application/http\n\nPOST Sales\n\n{{\"__id\":\"{}\"}}\n--b1--",
        "x".repeat(128)
    );
    let (status, _, _) = send(
        app,
        "POST",
        &format!("/stores/{STORE}/odata/$batch"),
        &[("content-type", "multipart/mixed; boundary=b1")],
        body,
    )
    .await;
    assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}
