//! Header validation and whole-batch limits.

use odstore_domain::Method;

use super::types::{BatchEnvelope, BatchFormatError, BatchLimits, BatchResult};

/// Extracts the `boundary` parameter from a `multipart/mixed` content type.
///
/// Quoted values are accepted. Anything else is a header error.
pub fn boundary_from_content_type(content_type: Option<&str>) -> BatchResult<String> {
    let content_type = content_type
        .ok_or_else(|| BatchFormatError::header("Content-Type header is missing"))?;

    let mut params = content_type.split(';');
    let media_type = params.next().unwrap_or_default().trim();
    if !media_type.eq_ignore_ascii_case("multipart/mixed") {
        return Err(BatchFormatError::header(format!(
            "Content-Type must be multipart/mixed, got '{media_type}'"
        )));
    }

    let boundary = params
        .filter_map(|param| param.split_once('='))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("boundary"))
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .unwrap_or_default();

    if boundary.is_empty() {
        return Err(BatchFormatError::header(
            "Content-Type has no boundary parameter",
        ));
    }
    Ok(boundary)
}

/// Applies the whole-batch limits to a parsed envelope.
///
/// The `$top` total is checked before the sub-request count.
pub fn enforce_limits(envelope: &BatchEnvelope, limits: &BatchLimits) -> BatchResult<()> {
    let total_top = total_top(envelope);
    if total_top > limits.max_total_top {
        return Err(BatchFormatError::TotalTopExceeded {
            total: total_top,
            max: limits.max_total_top,
        });
    }

    let count = envelope.request_count();
    if count > limits.max_requests {
        return Err(BatchFormatError::TooManyRequests {
            count,
            max: limits.max_requests,
        });
    }
    Ok(())
}

/// Sum of the `$top` values of all GET sub-requests. Values that do not
/// parse are skipped; execution reports them.
fn total_top(envelope: &BatchEnvelope) -> u64 {
    envelope
        .requests()
        .filter(|sub| sub.request.method == Method::Get)
        .filter_map(|sub| sub.request.query_option("$top"))
        .filter_map(|top| top.parse::<u64>().ok())
        .fold(0u64, u64::saturating_add)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::batch::types::{SubRequest, Unit};
    use odstore_domain::{ResourcePath, ResourceRequest};

    fn get(ordinal: usize, query: Option<&str>) -> Unit {
        let mut request = ResourceRequest::new(
            Method::Get,
            ResourcePath::parse("Sales").unwrap(),
        );
        if let Some(query) = query {
            request = request.with_query(query);
        }
        Unit::Single(SubRequest {
            ordinal,
            request,
            precheck: None,
        })
    }

    fn envelope(units: Vec<Unit>) -> BatchEnvelope {
        BatchEnvelope {
            boundary: "batch_1".to_string(),
            units,
        }
    }

    #[test]
    fn test_boundary_from_content_type() {
        assert_eq!(
            boundary_from_content_type(Some("multipart/mixed; boundary=batch_1")).unwrap(),
            "batch_1"
        );
        assert_eq!(
            boundary_from_content_type(Some("Multipart/Mixed;boundary=\"b 2\"")).unwrap(),
            "b 2"
        );
    }

    #[test]
    fn test_boundary_header_errors() {
        for content_type in [
            None,
            Some("application/json"),
            Some("multipart/mixed"),
            Some("multipart/mixed; boundary="),
            Some("multipart/mixed; charset=utf-8"),
        ] {
            let err = boundary_from_content_type(content_type).unwrap_err();
            assert_eq!(err.code(), "BATCH_BODY_FORMAT_HEADER_ERROR", "{content_type:?}");
        }
    }

    #[test]
    fn test_count_limit_is_inclusive() {
        let limits = BatchLimits {
            max_requests: 3,
            ..BatchLimits::default()
        };
        let ok = envelope((0..3).map(|i| get(i, None)).collect());
        assert!(enforce_limits(&ok, &limits).is_ok());

        let over = envelope((0..4).map(|i| get(i, None)).collect());
        assert_eq!(
            enforce_limits(&over, &limits).unwrap_err(),
            BatchFormatError::TooManyRequests { count: 4, max: 3 }
        );
    }

    #[test]
    fn test_top_total_checked_before_count() {
        let limits = BatchLimits {
            max_requests: 1,
            max_total_top: 100,
            ..BatchLimits::default()
        };
        let batch = envelope(vec![get(0, Some("$top=60")), get(1, Some("$top=41"))]);
        let err = enforce_limits(&batch, &limits).unwrap_err();
        assert_eq!(err.code(), "BATCH_TOTAL_TOP_COUNT_LIMITATION_EXCEEDED");
    }

    #[test]
    fn test_unparseable_top_is_ignored() {
        let limits = BatchLimits {
            max_total_top: 10,
            ..BatchLimits::default()
        };
        let batch = envelope(vec![get(0, Some("$top=abc")), get(1, Some("$top=10"))]);
        assert!(enforce_limits(&batch, &limits).is_ok());
    }

    #[test]
    fn test_too_many_requests_message_uses_separators() {
        let err = BatchFormatError::TooManyRequests {
            count: 1001,
            max: 1000,
        };
        assert!(err.to_string().contains("1,001"));
    }
}
