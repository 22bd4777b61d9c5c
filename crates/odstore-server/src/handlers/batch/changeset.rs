//! Changeset parsing.

use super::envelope::{part_kind, split_head, split_parts, ParserState, PartKind};
use super::translator::translate;
use super::types::{BatchFormatError, BatchResult, SubRequest};

/// Parses the body of a changeset part delimited by `boundary`.
///
/// Every part must be an `application/http` request. A changeset inside a
/// changeset is a nesting error; the flag on `state` enforces the single
/// permitted level.
pub(crate) fn parse_changeset(
    body: &str,
    boundary: &str,
    state: &mut ParserState,
) -> BatchResult<Vec<SubRequest>> {
    state.inside_changeset = true;
    let parsed = parse_parts(body, boundary, state);
    state.inside_changeset = false;
    parsed
}

fn parse_parts(
    body: &str,
    boundary: &str,
    state: &mut ParserState,
) -> BatchResult<Vec<SubRequest>> {
    let mut requests = Vec::new();
    for part in split_parts(body, boundary)? {
        let (headers, rest) = split_head(part)?;
        match part_kind(&headers, state)? {
            PartKind::Request => requests.push(translate(rest, state)?),
            // part_kind refuses multipart content while inside a changeset
            PartKind::Changeset(_) => return Err(BatchFormatError::ChangesetNest),
        }
    }

    if requests.is_empty() {
        return Err(BatchFormatError::parse(format!(
            "changeset {boundary} contains no requests"
        )));
    }
    Ok(requests)
}
