//! Data types for `$batch` processing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use odstore_domain::{codes, ExecutionOutcome, OperationFailure, ResourceRequest};

/// Reserved prefix of changeset boundaries.
pub const CHANGESET_BOUNDARY_PREFIX: &str = "changeset_";

/// Maximum number of sub-requests in one batch.
pub const DEFAULT_MAX_REQUESTS: usize = 1000;

/// Maximum sum of `$top` across all GET sub-requests of one batch.
pub const DEFAULT_MAX_TOTAL_TOP: u64 = 10_000;

/// Wall-clock budget for executing one batch.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(270_000);

/// Limits applied to every batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLimits {
    pub max_requests: usize,
    pub max_total_top: u64,
    pub timeout: Duration,
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_MAX_REQUESTS,
            max_total_top: DEFAULT_MAX_TOTAL_TOP,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// One embedded request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubRequest {
    /// Position in the whole batch, counting changeset members individually.
    pub ordinal: usize,
    pub request: ResourceRequest,
    /// Failure detected while translating, reported without dispatching.
    pub precheck: Option<OperationFailure>,
}

/// A top-level part of the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unit {
    Single(SubRequest),
    Changeset {
        boundary: String,
        requests: Vec<SubRequest>,
    },
}

impl Unit {
    pub fn request_count(&self) -> usize {
        match self {
            Unit::Single(_) => 1,
            Unit::Changeset { requests, .. } => requests.len(),
        }
    }

    pub fn requests(&self) -> impl Iterator<Item = &SubRequest> {
        let slice = match self {
            Unit::Single(request) => std::slice::from_ref(request),
            Unit::Changeset { requests, .. } => requests.as_slice(),
        };
        slice.iter()
    }
}

/// A parsed, structurally valid batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchEnvelope {
    pub boundary: String,
    pub units: Vec<Unit>,
}

impl BatchEnvelope {
    /// Total sub-request count; changesets count each member.
    pub fn request_count(&self) -> usize {
        self.units.iter().map(Unit::request_count).sum()
    }

    pub fn requests(&self) -> impl Iterator<Item = &SubRequest> {
        self.units.iter().flat_map(Unit::requests)
    }
}

/// Result of one unit, in envelope order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitOutcome {
    Single(Result<ExecutionOutcome, OperationFailure>),
    /// Either every member's outcome, or the one failure that aborted it.
    Changeset {
        boundary: String,
        result: Result<Vec<ExecutionOutcome>, OperationFailure>,
    },
}

impl UnitOutcome {
    pub fn is_failure(&self) -> bool {
        match self {
            UnitOutcome::Single(result) => result.is_err(),
            UnitOutcome::Changeset { result, .. } => result.is_err(),
        }
    }
}

/// Counters collected while running a batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    pub sub_requests: usize,
    pub dispatched: usize,
    pub failed_units: usize,
    pub rollbacks: usize,
    pub timed_out: bool,
}

/// The executed batch, ready to be composed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub boundary: String,
    pub units: Vec<UnitOutcome>,
    pub stats: BatchStats,
}

/// Cancellation flag shared between the transport and the coordinator.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Returns a guard that cancels the flag when dropped unless disarmed.
    pub fn drop_guard(&self) -> CancelOnDrop {
        CancelOnDrop {
            flag: Some(self.clone()),
        }
    }
}

/// Cancels its flag on drop. Held by the transport for the lifetime of the
/// HTTP request so a client disconnect stops the batch.
#[derive(Debug)]
pub struct CancelOnDrop {
    flag: Option<CancelFlag>,
}

impl CancelOnDrop {
    /// The request completed normally; dropping no longer cancels.
    pub fn disarm(mut self) {
        self.flag = None;
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        if let Some(flag) = self.flag.take() {
            flag.cancel();
        }
    }
}

/// Structural errors that reject the whole batch before any execution.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BatchFormatError {
    /// Boundary framing is broken or the envelope is empty.
    #[error("batch body parse error: {message}")]
    Parse { message: String },

    /// A boundary or changeset part has a missing or invalid header.
    #[error("batch body format header error: {message}")]
    Header { message: String },

    /// The request line does not carry a supported method.
    #[error("batch body format method error: {method}")]
    Method { method: String },

    /// The path does not fit the method.
    #[error("batch body format path error: {request_line}")]
    Path { request_line: String },

    /// A changeset appears inside a changeset.
    #[error("batch body format changeset nest error")]
    ChangesetNest,

    /// The batch carries more sub-requests than allowed.
    #[error("too many requests in $batch: {} (max {})", thousands(.count), thousands(.max))]
    TooManyRequests { count: usize, max: usize },

    /// The `$top` values of all GET sub-requests add up to more than allowed.
    #[error("total $top count {} exceeds the limit of {}", thousands(.total), thousands(.max))]
    TotalTopExceeded { total: u64, max: u64 },
}

impl BatchFormatError {
    pub fn parse(message: impl Into<String>) -> Self {
        BatchFormatError::Parse {
            message: message.into(),
        }
    }

    pub fn header(message: impl Into<String>) -> Self {
        BatchFormatError::Header {
            message: message.into(),
        }
    }

    /// The whole-batch `400 Bad Request` failure for this error.
    pub fn to_failure(&self) -> OperationFailure {
        OperationFailure::new(400, self.code(), self.to_string())
    }

    /// Stable error code.
    pub fn code(&self) -> &'static str {
        match self {
            BatchFormatError::Parse { .. } => codes::BATCH_BODY_PARSE_ERROR,
            BatchFormatError::Header { .. } => codes::BATCH_BODY_FORMAT_HEADER_ERROR,
            BatchFormatError::Method { .. } => codes::BATCH_BODY_FORMAT_METHOD_ERROR,
            BatchFormatError::Path { .. } => codes::BATCH_BODY_FORMAT_PATH_ERROR,
            BatchFormatError::ChangesetNest => codes::BATCH_BODY_FORMAT_CHANGESET_NEST_ERROR,
            BatchFormatError::TooManyRequests { .. } => codes::TOO_MANY_REQUESTS,
            BatchFormatError::TotalTopExceeded { .. } => {
                codes::BATCH_TOTAL_TOP_COUNT_LIMITATION_EXCEEDED
            }
        }
    }
}

/// Result type for batch parsing and validation.
pub type BatchResult<T> = Result<T, BatchFormatError>;

/// Formats an integer with `,` thousands separators.
pub fn thousands(n: impl std::fmt::Display) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1001), "1,001");
        assert_eq!(thousands(1_000_000u64), "1,000,000");
    }

    #[test]
    fn test_every_format_error_is_a_bad_request() {
        let errors = [
            BatchFormatError::parse("x"),
            BatchFormatError::header("x"),
            BatchFormatError::Method {
                method: "PATCH".to_string(),
            },
            BatchFormatError::ChangesetNest,
            BatchFormatError::TooManyRequests { count: 2, max: 1 },
        ];
        for err in errors {
            let failure = err.to_failure();
            assert_eq!(failure.status, 400);
            assert_eq!(failure.code, err.code());
        }
    }
}
