//! Shared helpers for the odstore HTTP integration tests.

// Each test file compiles this module separately and uses a different subset.
#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use tower::ServiceExt;

use odstore_api::http::{create_router, AppState};
use odstore_storage::{DataStore, EntityTypeDefinition, MemoryDataStore};

pub const STORE_ID: &str = "s1";
pub const BOUNDARY: &str = "batch_1";

/// Creates store `s1` with `Sales` (navigating to `SalesDetail`),
/// `SalesDetail` and `Supplier`.
pub async fn setup_store(storage: &MemoryDataStore) {
    storage.create_store(STORE_ID, "Test Store").await.unwrap();
    for (name, targets) in [
        ("SalesDetail", vec![]),
        ("Supplier", vec![]),
        ("Sales", vec!["SalesDetail".to_string()]),
    ] {
        storage
            .create_entity_type(
                STORE_ID,
                EntityTypeDefinition {
                    name: name.to_string(),
                    navigation_targets: targets,
                },
            )
            .await
            .unwrap();
    }
}

pub async fn seeded_storage() -> Arc<MemoryDataStore> {
    let storage = Arc::new(MemoryDataStore::new());
    setup_store(&storage).await;
    storage
}

/// Creates a router over `storage`. Call once per request with `oneshot`.
pub fn create_test_app(storage: &Arc<MemoryDataStore>) -> Router {
    create_router(AppState::new(Arc::clone(storage)))
}

pub fn batch_uri() -> String {
    format!("/stores/{STORE_ID}/odata/$batch")
}

/// One embedded request.
pub struct Part {
    method: &'static str,
    path: String,
    headers: Vec<(String, String)>,
    body: Option<String>,
}

impl Part {
    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path, None)
    }

    pub fn post(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new("POST", path, Some(body.into()))
    }

    pub fn put(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self::new("PUT", path, Some(body.into()))
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new("DELETE", path, None)
    }

    fn new(method: &'static str, path: impl Into<String>, body: Option<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    fn render(&self, out: &mut String) {
        out.push_str("Content-Type: application/http\r\nContent-Transfer-Encoding: binary\r\n\r\n");
        out.push_str(&format!("{} {} HTTP/1.1\r\n", self.method, self.path));
        if self.body.is_some() {
            out.push_str("Content-Type: application/json\r\n");
        }
        for (name, value) in &self.headers {
            out.push_str(&format!("{name}: {value}\r\n"));
        }
        out.push_str("\r\n");
        if let Some(body) = &self.body {
            out.push_str(body);
        }
        out.push_str("\r\n");
    }
}

/// A top-level unit of a batch body.
pub enum Unit {
    Single(Part),
    Changeset(String, Vec<Part>),
}

/// Builds a `$batch` body delimited by [`BOUNDARY`].
pub fn batch_body(units: &[Unit]) -> String {
    let mut out = String::new();
    for unit in units {
        out.push_str(&format!("--{BOUNDARY}\r\n"));
        match unit {
            Unit::Single(part) => part.render(&mut out),
            Unit::Changeset(changeset, parts) => {
                out.push_str(&format!(
                    "Content-Type: multipart/mixed; boundary={changeset}\r\n\r\n"
                ));
                for part in parts {
                    out.push_str(&format!("--{changeset}\r\n"));
                    part.render(&mut out);
                }
                out.push_str(&format!("--{changeset}--\r\n"));
            }
        }
    }
    out.push_str(&format!("--{BOUNDARY}--\r\n"));
    out
}

/// Posts a batch body with the given `Content-Type`.
pub async fn send_batch_with_content_type(
    app: Router,
    content_type: &str,
    body: String,
) -> (StatusCode, HeaderMap, String) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(batch_uri())
                .header("content-type", content_type)
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

pub async fn send_batch(app: Router, body: String) -> (StatusCode, HeaderMap, String) {
    send_batch_with_content_type(app, &format!("multipart/mixed; boundary={BOUNDARY}"), body)
        .await
}

/// Status codes of the embedded responses, in body order.
pub fn embedded_statuses(body: &str) -> Vec<u16> {
    body.lines()
        .filter_map(|line| line.strip_prefix("HTTP/1.1 "))
        .filter_map(|rest| rest.split_whitespace().next())
        .filter_map(|code| code.parse().ok())
        .collect()
}
