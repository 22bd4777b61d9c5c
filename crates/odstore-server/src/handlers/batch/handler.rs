//! `$batch` processor: ties parsing, limits, execution and composition
//! together.

use std::sync::Arc;
use std::time::Duration;

use odstore_domain::{OperationContext, ResourceOperations};
use tokio::time::Instant;
use tracing::info;

use super::composer::{compose, ComposedBatch};
use super::coordinator::execute_batch;
use super::envelope::parse_envelope;
use super::guard::{boundary_from_content_type, enforce_limits};
use super::types::{
    BatchEnvelope, BatchFormatError, BatchLimits, BatchOutcome, BatchResult, BatchStats,
    CancelFlag,
};

/// Result of processing one `$batch` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchResponse {
    /// The envelope was valid and executed; individual units may have failed.
    Accepted {
        composed: ComposedBatch,
        stats: BatchStats,
    },
    /// The envelope was rejected before anything was executed.
    Rejected(BatchFormatError),
}

/// Processes `$batch` requests against a resource operation backend.
pub struct BatchProcessor<O: ?Sized> {
    operations: Arc<O>,
    limits: BatchLimits,
}

impl<O: ?Sized> Clone for BatchProcessor<O> {
    fn clone(&self) -> Self {
        Self {
            operations: Arc::clone(&self.operations),
            limits: self.limits.clone(),
        }
    }
}

impl<O> BatchProcessor<O>
where
    O: ResourceOperations + ?Sized,
{
    pub fn new(operations: Arc<O>, limits: BatchLimits) -> Self {
        Self { operations, limits }
    }

    pub fn limits(&self) -> &BatchLimits {
        &self.limits
    }

    /// Parses and validates a batch without executing it.
    pub fn prepare(&self, content_type: Option<&str>, body: &[u8]) -> BatchResult<BatchEnvelope> {
        let boundary = boundary_from_content_type(content_type)?;
        let envelope = parse_envelope(body, &boundary)?;
        enforce_limits(&envelope, &self.limits)?;
        Ok(envelope)
    }

    /// Executes a prepared envelope within the configured timeout.
    pub async fn execute(
        &self,
        ctx: &OperationContext,
        envelope: BatchEnvelope,
        cancel: &CancelFlag,
    ) -> BatchOutcome {
        let started = Instant::now();
        let deadline = started
            .checked_add(self.limits.timeout)
            .unwrap_or_else(|| started + Duration::from_secs(24 * 60 * 60));
        execute_batch(self.operations.as_ref(), ctx, envelope, deadline, cancel).await
    }

    /// Parses, executes and composes one `$batch` request.
    pub async fn process(
        &self,
        ctx: &OperationContext,
        content_type: Option<&str>,
        body: &[u8],
        cancel: &CancelFlag,
    ) -> BatchResponse {
        let envelope = match self.prepare(content_type, body) {
            Ok(envelope) => envelope,
            Err(err) => {
                info!(code = err.code(), error = %err, "batch rejected");
                return BatchResponse::Rejected(err);
            }
        };
        let outcome = self.execute(ctx, envelope, cancel).await;
        BatchResponse::Accepted {
            composed: compose(&outcome),
            stats: outcome.stats,
        }
    }
}
