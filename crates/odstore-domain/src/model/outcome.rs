//! Typed results of resource operations.

use serde_json::json;

use super::headers::HeaderList;
use crate::error::DomainError;
use crate::resource::Entity;

/// Stable error codes reported in `{code, message}` bodies.
pub mod codes {
    pub const BATCH_BODY_PARSE_ERROR: &str = "BATCH_BODY_PARSE_ERROR";
    pub const BATCH_BODY_FORMAT_HEADER_ERROR: &str = "BATCH_BODY_FORMAT_HEADER_ERROR";
    pub const BATCH_BODY_FORMAT_METHOD_ERROR: &str = "BATCH_BODY_FORMAT_METHOD_ERROR";
    pub const BATCH_BODY_FORMAT_PATH_ERROR: &str = "BATCH_BODY_FORMAT_PATH_ERROR";
    pub const BATCH_BODY_FORMAT_CHANGESET_NEST_ERROR: &str =
        "BATCH_BODY_FORMAT_CHANGESET_NEST_ERROR";
    pub const TOO_MANY_REQUESTS: &str = "TOO_MANY_REQUESTS";
    pub const BATCH_TOTAL_TOP_COUNT_LIMITATION_EXCEEDED: &str =
        "BATCH_TOTAL_TOP_COUNT_LIMITATION_EXCEEDED";

    pub const NO_SUCH_STORE: &str = "NO_SUCH_STORE";
    pub const NO_SUCH_ENTITY_SET: &str = "NO_SUCH_ENTITY_SET";
    pub const NO_SUCH_ENTITY: &str = "NO_SUCH_ENTITY";
    pub const NO_SUCH_NAVPROP: &str = "NO_SUCH_NAVPROP";
    pub const ENTITY_ALREADY_EXISTS: &str = "ENTITY_ALREADY_EXISTS";
    pub const LINK_ALREADY_EXISTS: &str = "LINK_ALREADY_EXISTS";
    pub const NO_SUCH_LINK: &str = "NO_SUCH_LINK";
    pub const CONFLICT_LINKED_ENTITY: &str = "CONFLICT_LINKED_ENTITY";
    pub const ETAG_NOT_MATCH: &str = "ETAG_NOT_MATCH";
    pub const REQUEST_FIELD_FORMAT_ERROR: &str = "REQUEST_FIELD_FORMAT_ERROR";
    pub const JSON_PARSE_ERROR: &str = "JSON_PARSE_ERROR";
    pub const QUERY_PARSE_ERROR: &str = "QUERY_PARSE_ERROR";
    pub const KEY_FOR_NAVPROP_SHOULD_NOT_BE_SPECIFIED: &str =
        "KEY_FOR_NAVPROP_SHOULD_NOT_BE_SPECIFIED";
    pub const METHOD_NOT_ALLOWED: &str = "METHOD_NOT_ALLOWED";
    pub const METHOD_NOT_IMPLEMENTED: &str = "METHOD_NOT_IMPLEMENTED";
    pub const SERVER_REQUEST_TIMEOUT: &str = "SERVER_REQUEST_TIMEOUT";
    pub const TOO_MANY_CONCURRENT_REQUESTS: &str = "TOO_MANY_CONCURRENT_REQUESTS";
    pub const UNKNOWN_ERROR: &str = "UNKNOWN_ERROR";
}

/// A successful (or already rendered) HTTP-like result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub status: u16,
    pub headers: HeaderList,
    pub body: Vec<u8>,
}

impl ExecutionOutcome {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderList::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets a JSON body and its content type.
    pub fn with_json(mut self, value: &serde_json::Value) -> Self {
        self.headers.insert("Content-Type", "application/json");
        self.body = value.to_string().into_bytes();
        self
    }
}

/// A typed failure of one resource request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationFailure {
    pub status: u16,
    pub code: &'static str,
    pub message: String,
}

impl OperationFailure {
    pub fn new(status: u16, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn no_such_entity_set(name: &str) -> Self {
        Self::new(404, codes::NO_SUCH_ENTITY_SET, format!("No such entity set: {name}."))
    }

    pub fn no_such_entity(entity_set: &str, key: &str) -> Self {
        Self::new(
            404,
            codes::NO_SUCH_ENTITY,
            format!("The requested entity does not exist: {entity_set}('{key}')."),
        )
    }

    pub fn no_such_navprop(entity_set: &str, navigation: &str) -> Self {
        Self::new(
            400,
            codes::NO_SUCH_NAVPROP,
            format!("No such navigation property: {entity_set}/_{navigation}."),
        )
    }

    pub fn entity_already_exists(entity_set: &str, key: &str) -> Self {
        Self::new(
            409,
            codes::ENTITY_ALREADY_EXISTS,
            format!("The entity already exists: {entity_set}('{key}')."),
        )
    }

    pub fn request_field_format(field: &str) -> Self {
        Self::new(
            400,
            codes::REQUEST_FIELD_FORMAT_ERROR,
            format!("{field}: the field is reserved or has an invalid format."),
        )
    }

    pub fn json_parse(detail: impl std::fmt::Display) -> Self {
        Self::new(
            400,
            codes::JSON_PARSE_ERROR,
            format!("JSON parse error: {detail}."),
        )
    }

    pub fn query_parse(option: &str) -> Self {
        Self::new(
            400,
            codes::QUERY_PARSE_ERROR,
            format!("Invalid value for query option {option}."),
        )
    }

    pub fn key_for_navprop() -> Self {
        Self::new(
            400,
            codes::KEY_FOR_NAVPROP_SHOULD_NOT_BE_SPECIFIED,
            "A key must not be specified on the navigation property.",
        )
    }

    pub fn etag_not_match() -> Self {
        Self::new(
            412,
            codes::ETAG_NOT_MATCH,
            "The If-Match header does not match the current ETag.",
        )
    }

    pub fn method_not_allowed() -> Self {
        Self::new(
            405,
            codes::METHOD_NOT_ALLOWED,
            "The method is not allowed for this resource.",
        )
    }

    pub fn method_not_implemented() -> Self {
        Self::new(
            501,
            codes::METHOD_NOT_IMPLEMENTED,
            "Method not implemented.",
        )
    }

    pub fn timeout() -> Self {
        Self::new(
            503,
            codes::SERVER_REQUEST_TIMEOUT,
            "The request was not processed because the batch timed out.",
        )
    }

    pub fn too_many_concurrent() -> Self {
        Self::new(
            503,
            codes::TOO_MANY_CONCURRENT_REQUESTS,
            "Too many concurrent requests.",
        )
    }

    pub fn unknown(detail: impl std::fmt::Display) -> Self {
        Self::new(500, codes::UNKNOWN_ERROR, format!("Unknown error: {detail}."))
    }

    /// Renders the failure as an embedded response.
    pub fn to_outcome(&self) -> ExecutionOutcome {
        ExecutionOutcome::new(self.status).with_json(&json!({
            "code": self.code,
            "message": {
                "lang": "en",
                "value": self.message,
            }
        }))
    }
}

impl From<DomainError> for OperationFailure {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::InvalidMethod { .. } => Self::method_not_allowed(),
            DomainError::InvalidPath { path, message } => Self::new(
                400,
                codes::BATCH_BODY_FORMAT_PATH_ERROR,
                format!("Invalid resource path {path}: {message}."),
            ),
            DomainError::StoreNotFound { store_id } => Self::new(
                404,
                codes::NO_SUCH_STORE,
                format!("No such store: {store_id}."),
            ),
            DomainError::EntityTypeNotFound { name } => Self::no_such_entity_set(&name),
            DomainError::EntityNotFound { entity_set, id } => {
                Self::no_such_entity(&entity_set, &id)
            }
            DomainError::EntityAlreadyExists { entity_set, id } => {
                Self::entity_already_exists(&entity_set, &id)
            }
            DomainError::LinkAlreadyExists { link } => Self::new(
                409,
                codes::LINK_ALREADY_EXISTS,
                format!("The link already exists: {link}."),
            ),
            DomainError::LinkNotFound { link } => Self::new(
                404,
                codes::NO_SUCH_LINK,
                format!("No such link: {link}."),
            ),
            DomainError::EntityHasLinks { entity_set, id } => Self::new(
                409,
                codes::CONFLICT_LINKED_ENTITY,
                format!("{entity_set}('{id}') is still linked to other entities."),
            ),
            DomainError::VersionConflict { .. } => Self::etag_not_match(),
            DomainError::InvalidInput { message } => {
                Self::new(400, codes::REQUEST_FIELD_FORMAT_ERROR, message)
            }
            DomainError::Unavailable { .. } => Self::too_many_concurrent(),
            DomainError::Internal { message } => Self::unknown(message),
        }
    }
}

/// An association between two entities, as seen by resource operations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityLink {
    pub source_set: String,
    pub source_key: String,
    pub target_set: String,
    pub target_key: String,
}

impl EntityLink {
    pub fn new(
        source_set: impl Into<String>,
        source_key: impl Into<String>,
        target_set: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self {
            source_set: source_set.into(),
            source_key: source_key.into(),
            target_set: target_set.into(),
            target_key: target_key.into(),
        }
    }
}

/// A state change applied by a successful operation; the key for
/// compensating it during changeset rollback.
#[derive(Debug, Clone, PartialEq)]
pub enum AppliedMutation {
    Created {
        entity_set: String,
        key: String,
    },
    CreatedViaNavigation {
        entity_set: String,
        key: String,
        link: EntityLink,
    },
    Replaced {
        previous: Entity,
    },
    Deleted {
        previous: Entity,
    },
    Linked {
        link: EntityLink,
    },
}

/// A successful execution.
#[derive(Debug, Clone, PartialEq)]
pub struct Executed {
    pub outcome: ExecutionOutcome,
    pub mutation: Option<AppliedMutation>,
}

impl Executed {
    /// A result with no state change (reads).
    pub fn read(outcome: ExecutionOutcome) -> Self {
        Self {
            outcome,
            mutation: None,
        }
    }

    pub fn mutated(outcome: ExecutionOutcome, mutation: AppliedMutation) -> Self {
        Self {
            outcome,
            mutation: Some(mutation),
        }
    }
}

/// Result of executing one resource request.
pub type OperationResult = Result<Executed, OperationFailure>;
