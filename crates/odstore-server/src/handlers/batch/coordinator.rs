//! Transaction coordinator: executes units strictly in order.
//!
//! Single requests are dispatched once. A changeset runs its sub-requests in
//! order and stops at the first failure, undoing what earlier members of the
//! same changeset applied. Units never affect the outcome of their siblings.

use odstore_domain::{
    codes, AppliedMutation, ExecutionOutcome, InBatchEntityIndex, OperationContext,
    OperationFailure, ResourceOperations,
};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use super::types::{
    BatchEnvelope, BatchOutcome, BatchStats, CancelFlag, SubRequest, Unit, UnitOutcome,
};

/// Executes a parsed envelope against `operations`.
///
/// Dispatching stops once `deadline` passes or `cancel` is raised; every
/// unit not yet dispatched then reports `SERVER_REQUEST_TIMEOUT`.
#[instrument(
    skip_all,
    fields(store_id = %ctx.store_id, units = envelope.units.len())
)]
pub async fn execute_batch<O>(
    operations: &O,
    ctx: &OperationContext,
    envelope: BatchEnvelope,
    deadline: Instant,
    cancel: &CancelFlag,
) -> BatchOutcome
where
    O: ResourceOperations + ?Sized,
{
    let mut coordinator = Coordinator {
        operations,
        ctx,
        index: InBatchEntityIndex::new(),
        deadline,
        cancel,
        shutter: false,
        stats: BatchStats {
            sub_requests: envelope.request_count(),
            ..BatchStats::default()
        },
    };

    let mut units = Vec::with_capacity(envelope.units.len());
    for unit in envelope.units {
        let outcome = match unit {
            Unit::Single(sub) => UnitOutcome::Single(coordinator.run_single(&sub).await),
            Unit::Changeset { boundary, requests } => UnitOutcome::Changeset {
                result: coordinator.run_changeset(&requests).await,
                boundary,
            },
        };
        if outcome.is_failure() {
            coordinator.stats.failed_units += 1;
        }
        units.push(outcome);
    }

    let stats = coordinator.stats;
    info!(
        sub_requests = stats.sub_requests,
        dispatched = stats.dispatched,
        failed_units = stats.failed_units,
        rollbacks = stats.rollbacks,
        timed_out = stats.timed_out,
        "batch executed"
    );

    BatchOutcome {
        boundary: envelope.boundary,
        units,
        stats,
    }
}

struct Coordinator<'a, O: ?Sized> {
    operations: &'a O,
    ctx: &'a OperationContext,
    index: InBatchEntityIndex,
    deadline: Instant,
    cancel: &'a CancelFlag,
    /// Raised after a unit is refused for back-pressure
    /// (`TOO_MANY_CONCURRENT_REQUESTS`, which repositories produce from
    /// `DomainError::Unavailable`); later writes are refused without dispatch.
    shutter: bool,
    stats: BatchStats,
}

impl<'a, O> Coordinator<'a, O>
where
    O: ResourceOperations + ?Sized,
{
    /// True once the batch may dispatch nothing more.
    fn halted(&mut self) -> bool {
        if self.cancel.is_cancelled() || Instant::now() >= self.deadline {
            self.stats.timed_out = true;
        }
        self.stats.timed_out
    }

    async fn run_single(&mut self, sub: &SubRequest) -> Result<ExecutionOutcome, OperationFailure> {
        if self.halted() {
            return Err(OperationFailure::timeout());
        }
        let executed = self.dispatch(sub).await?;
        if let Some(mutation) = &executed.mutation {
            self.index.record(mutation);
        }
        Ok(executed.outcome)
    }

    async fn run_changeset(
        &mut self,
        requests: &[SubRequest],
    ) -> Result<Vec<ExecutionOutcome>, OperationFailure> {
        let mut applied: Vec<AppliedMutation> = Vec::new();
        let mut outcomes = Vec::with_capacity(requests.len());

        for sub in requests {
            if self.halted() {
                self.rollback(applied).await;
                return Err(OperationFailure::timeout());
            }
            match self.dispatch(sub).await {
                Ok(executed) => {
                    if let Some(mutation) = executed.mutation {
                        self.index.record(&mutation);
                        applied.push(mutation);
                    }
                    outcomes.push(executed.outcome);
                }
                Err(failure) => {
                    debug!(
                        ordinal = sub.ordinal,
                        code = failure.code,
                        "changeset member failed"
                    );
                    self.rollback(applied).await;
                    return Err(failure);
                }
            }
        }
        Ok(outcomes)
    }

    async fn dispatch(&mut self, sub: &SubRequest) -> odstore_domain::OperationResult {
        if let Some(failure) = &sub.precheck {
            return Err(failure.clone());
        }
        let method = sub.request.method;
        if self.shutter && method.is_write() {
            return Err(OperationFailure::too_many_concurrent());
        }

        debug!(
            ordinal = sub.ordinal,
            method = method.as_str(),
            path = %sub.request.path,
            "dispatching sub-request"
        );
        self.stats.dispatched += 1;
        let result = self
            .operations
            .execute(self.ctx, &sub.request, &self.index)
            .await;

        if let Err(failure) = &result {
            if failure.code == codes::TOO_MANY_CONCURRENT_REQUESTS {
                self.shutter = true;
            }
        }
        result
    }

    /// Undoes `applied` in reverse order. Reads applied nothing and need no
    /// compensation.
    async fn rollback(&mut self, applied: Vec<AppliedMutation>) {
        if applied.is_empty() {
            return;
        }
        self.stats.rollbacks += 1;
        warn!(mutations = applied.len(), "rolling back changeset");

        for mutation in applied.iter().rev() {
            if let Err(failure) = self.operations.undo(self.ctx, mutation).await {
                error!(
                    code = failure.code,
                    message = %failure.message,
                    ?mutation,
                    "failed to undo changeset mutation"
                );
            }
            self.index.revert(mutation);
        }
    }
}
