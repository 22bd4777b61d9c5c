//! Translates one raw request block into a [`SubRequest`].
//!
//! Validation here is syntactic only; nothing is dispatched.

use odstore_domain::resource::json::reserved_field_in_body;
use odstore_domain::{Method, OperationFailure, ResourcePath, ResourceRequest};

use super::envelope::{parse_headers, ParserState};
use super::types::{BatchFormatError, BatchResult, SubRequest};

/// Parses `METHOD path [HTTP/1.1]`, the request headers and the body.
pub(crate) fn translate(block: &str, state: &mut ParserState) -> BatchResult<SubRequest> {
    let block = block.trim_start_matches('\n');
    let (request_line, rest) = block.split_once('\n').unwrap_or((block, ""));
    let (method, uri) = parse_request_line(request_line)?;

    let path_error = || BatchFormatError::Path {
        request_line: format!("{method} {uri} HTTP/1.1"),
    };

    let (path, query) = match uri.split_once('?') {
        Some((path, query)) => (path, Some(query).filter(|q| !q.is_empty())),
        None => (uri, None),
    };
    let path = ResourcePath::parse(path).map_err(|_| path_error())?;
    if query.is_some() && path.is_multi_segment() {
        return Err(path_error());
    }
    if !method.accepts(path.shape()) {
        return Err(path_error());
    }

    let (header_block, body) = match rest.strip_prefix('\n') {
        Some(body) => ("", body),
        None => rest.split_once("\n\n").unwrap_or((rest, "")),
    };
    let body = body.trim_end_matches('\n');

    let mut request = ResourceRequest::new(method, path).with_body(body.as_bytes());
    request.headers = parse_headers(header_block);
    // Query options are only honoured on reads.
    if let (Method::Get, Some(query)) = (method, query) {
        request = request.with_query(query);
    }

    let precheck = match method {
        Method::Put => reserved_field_in_body(&request.body).map(OperationFailure::request_field_format),
        _ => None,
    };

    Ok(SubRequest {
        ordinal: state.take_ordinal(),
        request,
        precheck,
    })
}

fn parse_request_line(line: &str) -> BatchResult<(Method, &str)> {
    let mut tokens = line.split_whitespace();
    let method_token = tokens.next().unwrap_or_default();
    let uri = tokens.next();
    let version = tokens.next();

    let well_formed = uri.is_some()
        && version.map_or(true, |v| v.starts_with("HTTP/"))
        && tokens.next().is_none();
    let method = method_token
        .parse::<Method>()
        .ok()
        .filter(|_| well_formed)
        .ok_or_else(|| BatchFormatError::Method {
            method: method_token.to_string(),
        })?;

    Ok((method, uri.unwrap_or_default()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use odstore_domain::PathShape;

    fn run(block: &str) -> BatchResult<SubRequest> {
        translate(block, &mut ParserState::new())
    }

    #[test]
    fn test_translates_post_with_headers_and_body() {
        let sub = run("POST Sales HTTP/1.1\nContent-Type: application/json\nContent-Length: 12\n\n{\"__id\":\"k\"}\n\n").unwrap();
        assert_eq!(sub.ordinal, 0);
        assert_eq!(sub.request.method, Method::Post);
        assert_eq!(sub.request.path.shape(), PathShape::Collection);
        assert_eq!(sub.request.headers.get("content-type"), Some("application/json"));
        assert_eq!(sub.request.body, b"{\"__id\":\"k\"}".to_vec());
        assert!(sub.precheck.is_none());
    }

    #[test]
    fn test_translates_get_without_headers() {
        let sub = run("GET Sales('k') HTTP/1.1\n\n").unwrap();
        assert_eq!(sub.request.path.key(), Some("k"));
        assert!(sub.request.headers.is_empty());
        assert!(sub.request.body.is_empty());
    }

    #[test]
    fn test_version_token_is_optional() {
        let sub = run("GET Sales?$top=5&$skip=1\n").unwrap();
        assert_eq!(sub.request.query_option("$top"), Some("5"));
    }

    #[test]
    fn test_query_is_dropped_for_writes() {
        let sub = run("DELETE Sales('k')?x=1 HTTP/1.1\n\n").unwrap();
        assert!(sub.request.query.is_none());
    }

    #[test]
    fn test_invalid_method_token() {
        let err = run("PATCH Sales('k') HTTP/1.1\n\n").unwrap_err();
        assert_eq!(
            err,
            BatchFormatError::Method {
                method: "PATCH".to_string()
            }
        );
        assert!(matches!(run("get Sales HTTP/1.1\n"), Err(BatchFormatError::Method { .. })));
        assert!(matches!(run("GET\n"), Err(BatchFormatError::Method { .. })));
        assert!(matches!(run("GET Sales FTP/1\n"), Err(BatchFormatError::Method { .. })));
    }

    #[test]
    fn test_method_path_mismatch_carries_request_line() {
        let err = run("PUT Sales HTTP/1.1\n\n{}").unwrap_err();
        assert_eq!(
            err,
            BatchFormatError::Path {
                request_line: "PUT Sales HTTP/1.1".to_string()
            }
        );
        assert_eq!(err.code(), "BATCH_BODY_FORMAT_PATH_ERROR");
        assert!(matches!(run("POST Sales('k') HTTP/1.1\n\n{}"), Err(BatchFormatError::Path { .. })));
        assert!(matches!(run("DELETE Sales HTTP/1.1\n\n"), Err(BatchFormatError::Path { .. })));
    }

    #[test]
    fn test_unparseable_path() {
        assert!(matches!(run("GET Sales(k) HTTP/1.1\n\n"), Err(BatchFormatError::Path { .. })));
    }

    #[test]
    fn test_query_on_navigation_path_is_rejected() {
        let err = run("GET Sales('k')/_SalesDetail?$top=1 HTTP/1.1\n\n").unwrap_err();
        assert!(matches!(err, BatchFormatError::Path { .. }));
    }

    #[test]
    fn test_put_with_reserved_field_gets_precheck_failure() {
        let sub = run("PUT Sales('k') HTTP/1.1\n\n{\"__id\":\"k\",\"__updated\":1}").unwrap();
        let failure = sub.precheck.expect("precheck failure");
        assert_eq!(failure.status, 400);
        assert_eq!(failure.code, "REQUEST_FIELD_FORMAT_ERROR");
    }

    #[test]
    fn test_ordinals_are_sequential() {
        let mut state = ParserState::new();
        let first = translate("GET Sales HTTP/1.1\n\n", &mut state).unwrap();
        let second = translate("GET Sales HTTP/1.1\n\n", &mut state).unwrap();
        assert_eq!((first.ordinal, second.ordinal), (0, 1));
    }
}
