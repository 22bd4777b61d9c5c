//! OData `$batch` processing.
//!
//! A `$batch` request carries a `multipart/mixed` envelope of sub-requests.
//! Each top-level part is either a single request or a changeset whose
//! members execute atomically. Processing runs in three stages:
//!
//! 1. **Parse and guard**: the whole envelope is parsed and validated
//!    (`envelope`, `changeset`, `translator`, `guard`). Any structural
//!    error rejects the batch with one `400` before anything executes.
//! 2. **Execute**: units run strictly in order against a
//!    [`ResourceOperations`](odstore_domain::ResourceOperations) backend with
//!    a batch-scoped in-batch entity index. A failing changeset member aborts
//!    its changeset and undoes the members applied before it.
//! 3. **Compose**: outcomes are serialized into a `202 Accepted` multipart
//!    body that mirrors the request structure.
//!
//! ```text
//! --batch_1
//! Content-Type: application/http
//!
//! GET Sales('k1') HTTP/1.1
//!
//! --batch_1
//! Content-Type: multipart/mixed; boundary=changeset_1
//!
//! --changeset_1
//! Content-Type: application/http
//!
//! POST Sales HTTP/1.1
//! Content-Type: application/json
//!
//! {"__id":"k2"}
//! --changeset_1--
//!
//! --batch_1--
//! ```

mod changeset;
mod composer;
mod coordinator;
mod envelope;
mod guard;
mod handler;
mod translator;
mod types;

pub use composer::{compose, reason_phrase, ComposedBatch, DATA_SERVICE_VERSION};
pub use coordinator::execute_batch;
pub use envelope::parse_envelope;
pub use guard::{boundary_from_content_type, enforce_limits};
pub use handler::{BatchProcessor, BatchResponse};
pub use types::{
    thousands, BatchEnvelope, BatchFormatError, BatchLimits, BatchOutcome, BatchResult,
    BatchStats, CancelFlag, CancelOnDrop, SubRequest, Unit, UnitOutcome,
    CHANGESET_BOUNDARY_PREFIX, DEFAULT_MAX_REQUESTS, DEFAULT_MAX_TOTAL_TOP, DEFAULT_TIMEOUT,
};
