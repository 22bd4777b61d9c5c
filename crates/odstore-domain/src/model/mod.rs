//! Request and response model for resource operations.

mod headers;
mod outcome;
mod path;

#[cfg(test)]
mod path_proptest;

use std::fmt;
use std::str::FromStr;

pub use headers::HeaderList;
pub use outcome::{
    codes, AppliedMutation, EntityLink, Executed, ExecutionOutcome, OperationFailure,
    OperationResult,
};
pub use path::{parse_query, PathShape, ResourcePath};

use crate::error::DomainError;

/// HTTP method of a resource request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    /// Returns true for methods that may change state.
    pub fn is_write(&self) -> bool {
        !matches!(self, Method::Get)
    }

    /// Checks method/path-shape compatibility.
    ///
    /// `POST` targets a collection, a navigation property or `$links`;
    /// `PUT` and `DELETE` target an entity or `$links`; `GET` accepts any shape.
    pub fn accepts(&self, shape: PathShape) -> bool {
        match self {
            Method::Get => true,
            Method::Post => matches!(
                shape,
                PathShape::Collection | PathShape::Navigation | PathShape::Links
            ),
            Method::Put | Method::Delete => matches!(shape, PathShape::Entity | PathShape::Links),
        }
    }
}

impl FromStr for Method {
    type Err = DomainError;

    /// Parses the exact upper-case method token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(DomainError::InvalidMethod {
                method: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resource request, already validated for method/path shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRequest {
    pub method: Method,
    pub path: ResourcePath,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub headers: HeaderList,
    pub body: Vec<u8>,
}

impl ResourceRequest {
    pub fn new(method: Method, path: ResourcePath) -> Self {
        Self {
            method,
            path,
            query: None,
            headers: HeaderList::new(),
            body: Vec::new(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the last value of a query option, e.g. `$top`.
    pub fn query_option(&self, name: &str) -> Option<&str> {
        let query = self.query.as_deref()?;
        parse_query(query)
            .filter(|(key, _)| *key == name)
            .map(|(_, value)| value)
            .last()
    }
}
