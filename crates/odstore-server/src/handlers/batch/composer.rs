//! Serializes an executed batch back into a `multipart/mixed` body whose
//! structure mirrors the request.

use std::fmt::Write as _;

use http::StatusCode;
use odstore_domain::{ExecutionOutcome, OperationFailure};

use super::types::{BatchOutcome, UnitOutcome};

/// OData protocol version advertised on responses.
pub const DATA_SERVICE_VERSION: &str = "2.0";

/// A composed `$batch` response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedBatch {
    pub status: u16,
    pub content_type: String,
    pub body: String,
}

/// Builds the `202 Accepted` response for an executed batch.
pub fn compose(outcome: &BatchOutcome) -> ComposedBatch {
    let boundary = &outcome.boundary;
    let mut body = String::new();

    for unit in &outcome.units {
        let _ = writeln!(body, "--{boundary}");
        match unit {
            UnitOutcome::Single(result) => {
                body.push_str("Content-Type: application/http\n\n");
                body.push_str(&result_part(result));
            }
            UnitOutcome::Changeset {
                boundary: changeset,
                result,
            } => {
                let _ = write!(
                    body,
                    "Content-Type: multipart/mixed; boundary={changeset}\n\n"
                );
                match result {
                    Ok(outcomes) => {
                        for outcome in outcomes {
                            push_changeset_member(&mut body, changeset, &http_part(outcome));
                        }
                    }
                    Err(failure) => {
                        let part = http_part(&failure.to_outcome());
                        push_changeset_member(&mut body, changeset, &part);
                    }
                }
                let _ = write!(body, "--{changeset}--\n\n");
            }
        }
    }
    let _ = write!(body, "--{boundary}--");

    ComposedBatch {
        status: StatusCode::ACCEPTED.as_u16(),
        content_type: format!("multipart/mixed; boundary={boundary}"),
        body,
    }
}

fn push_changeset_member(body: &mut String, changeset: &str, part: &str) {
    let _ = write!(
        body,
        "--{changeset}\nContent-Type: application/http\nContent-Transfer-Encoding: binary\n\n{part}"
    );
}

fn result_part(result: &Result<ExecutionOutcome, OperationFailure>) -> String {
    match result {
        Ok(outcome) => http_part(outcome),
        Err(failure) => http_part(&failure.to_outcome()),
    }
}

/// Renders one embedded HTTP response. An outcome that cannot be framed is
/// replaced by an `UNKNOWN_ERROR` response.
fn http_part(outcome: &ExecutionOutcome) -> String {
    render(outcome).unwrap_or_else(|failure| {
        // The failure body is plain JSON with no framing hazards.
        render(&failure.to_outcome()).unwrap_or_default()
    })
}

fn render(outcome: &ExecutionOutcome) -> Result<String, OperationFailure> {
    let mut part = String::new();
    let _ = writeln!(
        part,
        "HTTP/1.1 {} {}",
        outcome.status,
        reason_phrase(outcome.status)
    );

    for (name, value) in outcome.headers.iter() {
        if has_line_break(name) || has_line_break(value) {
            return Err(OperationFailure::unknown(format!(
                "response header {name:?} cannot be framed"
            )));
        }
        let _ = writeln!(part, "{name}: {value}");
    }
    part.push('\n');

    if !outcome.body.is_empty() {
        let body = std::str::from_utf8(&outcome.body)
            .map_err(|_| OperationFailure::unknown("response body is not valid UTF-8"))?;
        part.push_str(body);
        part.push_str("\n\n");
    }
    Ok(part)
}

fn has_line_break(s: &str) -> bool {
    s.contains(['\r', '\n'])
}

/// Canonical reason phrase for a status code.
pub fn reason_phrase(status: u16) -> &'static str {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown")
}
