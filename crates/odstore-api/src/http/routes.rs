//! HTTP route definitions and handlers.

use std::sync::Arc;

use axum::{
    async_trait,
    body::{Body, Bytes},
    extract::{DefaultBodyLimit, FromRequest, Path, Request, State},
    http::{header::CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{error, warn};

use odstore_domain::{
    ExecutionOutcome, InBatchEntityIndex, Method, OperationContext, OperationFailure,
    ResourceOperations, ResourcePath, ResourceRequest,
};
use odstore_server::handlers::batch::{BatchResponse, CancelFlag, DATA_SERVICE_VERSION};
use odstore_storage::{DataStore, EntityTypeDefinition, Store};

use super::state::AppState;
use crate::errors::{error_codes, ApiError, ApiResult};
use crate::middleware::{cors_layer, MetricsLayer, RequestIdLayer, RequestMetrics};
use crate::observability::{metrics_handler, record_batch, record_batch_rejected, MetricsState};

/// JSON extractor that answers malformed bodies with 400 instead of 422,
/// keeping 413 for bodies over the size limit.
pub struct JsonBadRequest<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonBadRequest<T>
where
    T: serde::de::DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(JsonBadRequest(value)),
            Err(rejection) => {
                let message = rejection.body_text();
                if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
                    Err(ApiError::payload_too_large(message))
                } else {
                    Err(ApiError::validation_error(message))
                }
            }
        }
    }
}

/// Default request body size limit of the management routes (1 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// The path segment that selects the batch processor.
const BATCH_SEGMENT: &str = "$batch";

fn management_routes<S: DataStore>() -> Router<Arc<AppState<S>>> {
    Router::new()
        .route("/stores", post(create_store::<S>).get(list_stores::<S>))
        .route(
            "/stores/:store_id",
            get(get_store::<S>).delete(delete_store::<S>),
        )
        .route(
            "/stores/:store_id/entity-types",
            post(create_entity_type::<S>).get(list_entity_types::<S>),
        )
        .route("/ready", get(readiness_check::<S>))
}

fn odata_routes<S: DataStore>() -> Router<Arc<AppState<S>>> {
    Router::new().route("/stores/:store_id/odata/*path", any(odata::<S>))
}

/// Creates the HTTP router without the `/metrics` endpoint.
pub fn create_router<S: DataStore>(state: AppState<S>) -> Router {
    build_router(state, None)
}

/// Creates the HTTP router including the Prometheus endpoint at
/// [`AppState::metrics_path`].
pub fn create_router_with_observability<S: DataStore>(
    state: AppState<S>,
    metrics_state: MetricsState,
) -> Router {
    build_router(state, Some(metrics_state))
}

fn build_router<S: DataStore>(state: AppState<S>, metrics_state: Option<MetricsState>) -> Router {
    let batch_body_limit = state.batch_body_limit;
    let request_timeout = state.request_timeout;
    let metrics_path = state.metrics_path.clone();
    let shared_state = Arc::new(state);

    let management = management_routes::<S>()
        .with_state(Arc::clone(&shared_state))
        .layer(RequestBodyLimitLayer::new(DEFAULT_BODY_LIMIT))
        .layer(TimeoutLayer::new(request_timeout));

    // OData calls are bounded by the batch deadline instead of the route timeout.
    let odata = odata_routes::<S>()
        .with_state(shared_state)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(batch_body_limit));

    let mut router = management
        .merge(odata)
        .route("/health", get(health_check));

    if let Some(metrics_state) = metrics_state {
        router = router.merge(
            Router::new()
                .route(&metrics_path, get(metrics_handler))
                .with_state(metrics_state),
        );
    }

    router
        .fallback(route_not_found)
        .layer(MetricsLayer::new(Arc::new(RequestMetrics::new())))
        .layer(TraceLayer::new_for_http())
        .layer(RequestIdLayer::new())
        .layer(cors_layer())
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::new(
        error_codes::ROUTE_NOT_FOUND,
        format!("no route for {}", uri.path()),
    )
}

// ============================================================
// Health and Readiness Checks
// ============================================================

/// Liveness check. Does not touch storage.
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Readiness check: 200 when the storage backend reports healthy, 503 otherwise.
async fn readiness_check<S: DataStore>(State(state): State<Arc<AppState<S>>>) -> impl IntoResponse {
    let healthy = match state.storage.health_check().await {
        Ok(status) if status.healthy => true,
        Ok(status) => {
            warn!(message = ?status.message, "storage reported unhealthy");
            false
        }
        Err(e) => {
            error!(error = %e, "readiness check failed");
            false
        }
    };

    if healthy {
        (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "ready", "checks": { "storage": "ok" } })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "not_ready", "checks": { "storage": "unavailable" } })),
        )
    }
}

// ============================================================
// Store Management
// ============================================================

#[derive(Debug, Deserialize)]
pub struct CreateStoreRequest {
    /// Store ID; a ULID is generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct StoreResponse {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Store> for StoreResponse {
    fn from(store: Store) -> Self {
        Self {
            id: store.id,
            name: store.name,
            created_at: store.created_at.to_rfc3339(),
            updated_at: store.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListStoresResponse {
    pub stores: Vec<StoreResponse>,
}

async fn create_store<S: DataStore>(
    State(state): State<Arc<AppState<S>>>,
    JsonBadRequest(body): JsonBadRequest<CreateStoreRequest>,
) -> ApiResult<impl IntoResponse> {
    let id = body
        .id
        .unwrap_or_else(|| ulid::Ulid::new().to_string());
    let store = state.storage.create_store(&id, &body.name).await?;

    Ok((StatusCode::CREATED, Json(StoreResponse::from(store))))
}

async fn get_store<S: DataStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(store_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let store = state.storage.get_store(&store_id).await?;
    Ok(Json(StoreResponse::from(store)))
}

async fn list_stores<S: DataStore>(
    State(state): State<Arc<AppState<S>>>,
) -> ApiResult<impl IntoResponse> {
    let stores = state.storage.list_stores().await?;
    Ok(Json(ListStoresResponse {
        stores: stores.into_iter().map(StoreResponse::from).collect(),
    }))
}

/// Deletes a store together with its schema, entities and links.
async fn delete_store<S: DataStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(store_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    state.storage.delete_store(&store_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================
// Entity Types
// ============================================================

#[derive(Debug, Serialize)]
pub struct ListEntityTypesResponse {
    pub entity_types: Vec<EntityTypeDefinition>,
}

/// Creates an entity set. Navigation targets must already exist; the
/// association is recorded on both sides.
async fn create_entity_type<S: DataStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(store_id): Path<String>,
    JsonBadRequest(body): JsonBadRequest<EntityTypeDefinition>,
) -> ApiResult<impl IntoResponse> {
    let created = state.storage.create_entity_type(&store_id, body).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_entity_types<S: DataStore>(
    State(state): State<Arc<AppState<S>>>,
    Path(store_id): Path<String>,
) -> ApiResult<impl IntoResponse> {
    let entity_types = state.storage.list_entity_types(&store_id).await?;
    Ok(Json(ListEntityTypesResponse { entity_types }))
}

// ============================================================
// OData
// ============================================================

/// Base URI of a store's OData service.
fn odata_context(store_id: &str) -> OperationContext {
    OperationContext::new(store_id, format!("/stores/{store_id}/odata"))
}

/// Routes `$batch` to the batch processor and everything else to a single
/// resource operation.
async fn odata<S: DataStore>(
    State(state): State<Arc<AppState<S>>>,
    Path((store_id, path)): Path<(String, String)>,
    method: axum::http::Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = path.trim_start_matches('/');
    if path == BATCH_SEGMENT {
        if method != axum::http::Method::POST {
            return outcome_response(OperationFailure::method_not_allowed().to_outcome());
        }
        return odata_batch(state, store_id, &headers, body).await;
    }
    odata_resource(state, store_id, path, &method, uri.query(), &headers, body).await
}

/// Runs a `$batch` request.
///
/// The batch executes on its own task. The handler holds a drop guard on the
/// cancellation flag, so when the client disconnects and this future is
/// dropped, the coordinator stops dispatching and rolls back an open
/// changeset.
async fn odata_batch<S: DataStore>(
    state: Arc<AppState<S>>,
    store_id: String,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(err) = state.storage.get_store(&store_id).await {
        return ApiError::from(err).into_response();
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    let ctx = odata_context(&store_id);
    let processor = state.batch.clone();
    let cancel = CancelFlag::new();
    let guard = cancel.drop_guard();

    let task = tokio::spawn(async move {
        processor
            .process(&ctx, content_type.as_deref(), &body, &cancel)
            .await
    });
    let result = task.await;
    guard.disarm();

    match result {
        Ok(BatchResponse::Accepted { composed, stats }) => {
            record_batch(&stats);
            let status = StatusCode::from_u16(composed.status).unwrap_or(StatusCode::ACCEPTED);
            (
                status,
                [
                    (CONTENT_TYPE, composed.content_type),
                    (
                        HeaderName::from_static("dataserviceversion"),
                        DATA_SERVICE_VERSION.to_string(),
                    ),
                ],
                composed.body,
            )
                .into_response()
        }
        Ok(BatchResponse::Rejected(err)) => {
            record_batch_rejected(err.code());
            ApiError::from(err).into_response()
        }
        Err(join_error) => {
            error!(error = %join_error, store_id = %store_id, "batch task failed");
            ApiError::internal_error("batch processing failed").into_response()
        }
    }
}

/// Runs one OData resource request with an empty in-batch index.
async fn odata_resource<S: DataStore>(
    state: Arc<AppState<S>>,
    store_id: String,
    path: &str,
    method: &axum::http::Method,
    query: Option<&str>,
    headers: &HeaderMap,
    body: Bytes,
) -> Response {
    let request = match resource_request(method, path, query, headers, body) {
        Ok(request) => request,
        Err(failure) => return outcome_response(failure.to_outcome()),
    };

    let ctx = odata_context(&store_id);
    let index = InBatchEntityIndex::new();
    match state.resources.execute(&ctx, &request, &index).await {
        Ok(executed) => outcome_response(executed.outcome),
        Err(failure) => outcome_response(failure.to_outcome()),
    }
}

/// Builds a resource request from the HTTP call. The query string is kept
/// for `GET` only.
fn resource_request(
    method: &axum::http::Method,
    path: &str,
    query: Option<&str>,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<ResourceRequest, OperationFailure> {
    let method: Method = method.as_str().parse()?;
    let path = ResourcePath::parse(path)?;
    if !method.accepts(path.shape()) {
        return Err(OperationFailure::method_not_allowed());
    }

    let mut request = ResourceRequest::new(method, path).with_body(body.to_vec());
    if method == Method::Get {
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            request = request.with_query(query);
        }
    }
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            request.headers.insert(name.as_str(), value);
        }
    }
    Ok(request)
}

/// Converts an execution outcome into an HTTP response.
fn outcome_response(outcome: ExecutionOutcome) -> Response {
    let status = StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(Body::from(outcome.body));
    *response.status_mut() = status;

    for (name, value) in outcome.headers.iter() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().insert(name, value);
            }
            _ => warn!(header = name, "dropping response header that cannot be encoded"),
        }
    }
    response
}
