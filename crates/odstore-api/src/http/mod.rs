//! HTTP REST API endpoints.
//!
//! # Endpoints
//!
//! | Endpoint | Method | Description |
//! |----------|--------|-------------|
//! | `/stores` | POST | Create store |
//! | `/stores` | GET | List stores |
//! | `/stores/{store_id}` | GET | Get store |
//! | `/stores/{store_id}` | DELETE | Delete store |
//! | `/stores/{store_id}/entity-types` | POST | Create entity set |
//! | `/stores/{store_id}/entity-types` | GET | List entity sets |
//! | `/stores/{store_id}/odata/$batch` | POST | Batch processor |
//! | `/stores/{store_id}/odata/{path}` | GET, POST, PUT, DELETE | Single resource operation |
//! | `/health` | GET | Liveness |
//! | `/ready` | GET | Readiness |
//! | `/metrics` | GET | Prometheus metrics |

pub mod routes;
pub mod state;

pub use routes::{create_router, create_router_with_observability, DEFAULT_BODY_LIMIT};
pub use state::{AppState, StoreResources, DEFAULT_BATCH_BODY_LIMIT, DEFAULT_REQUEST_TIMEOUT};

#[cfg(test)]
mod tests;
