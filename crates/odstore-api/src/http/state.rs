//! Application state for HTTP handlers.

use std::sync::Arc;
use std::time::Duration;

use odstore_domain::EntityResource;
use odstore_server::handlers::batch::{BatchLimits, BatchProcessor};
use odstore_server::ServerConfig;
use odstore_storage::DataStore;

use crate::adapters::DataStoreEntityRepository;

/// The resource operations served over HTTP for a storage backend.
pub type StoreResources<S> = EntityResource<DataStoreEntityRepository<S>>;

/// Default `$batch` request body size limit (16 MiB).
pub const DEFAULT_BATCH_BODY_LIMIT: usize = 16 * 1024 * 1024;

/// Default timeout for non-batch routes.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Application state shared across all HTTP handlers.
///
/// Single OData requests and `$batch` sub-requests run through the same
/// [`EntityResource`], which reaches storage via
/// [`DataStoreEntityRepository`].
pub struct AppState<S: DataStore> {
    pub storage: Arc<S>,
    pub resources: Arc<StoreResources<S>>,
    pub batch: BatchProcessor<StoreResources<S>>,
    /// Body size limit of the OData routes, `$batch` included.
    pub batch_body_limit: usize,
    /// Timeout applied to every route except the OData routes.
    pub request_timeout: Duration,
    /// Path of the Prometheus endpoint.
    pub metrics_path: String,
}

impl<S: DataStore> AppState<S> {
    /// Creates a state with default batch limits.
    pub fn new(storage: Arc<S>) -> Self {
        Self::with_batch_limits(storage, BatchLimits::default())
    }

    /// Creates a state with custom batch limits.
    pub fn with_batch_limits(storage: Arc<S>, limits: BatchLimits) -> Self {
        let repository = Arc::new(DataStoreEntityRepository::new(Arc::clone(&storage)));
        let resources = Arc::new(EntityResource::new(repository));
        let batch = BatchProcessor::new(Arc::clone(&resources), limits);

        Self {
            storage,
            resources,
            batch,
            batch_body_limit: DEFAULT_BATCH_BODY_LIMIT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            metrics_path: "/metrics".to_string(),
        }
    }

    /// Creates a state from the loaded server configuration.
    pub fn from_config(storage: Arc<S>, config: &ServerConfig) -> Self {
        let mut state = Self::with_batch_limits(storage, config.batch.limits());
        state.batch_body_limit = config.server.max_batch_body_bytes;
        state.request_timeout = Duration::from_secs(config.server.request_timeout_secs);
        state.metrics_path = config.metrics.path.clone();
        state
    }
}
