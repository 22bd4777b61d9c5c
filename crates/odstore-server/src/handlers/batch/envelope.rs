//! Envelope parsing: splits a `$batch` body into ordered units.
//!
//! Parsing is a pure pre-pass. The whole envelope, including every changeset,
//! is validated before anything is executed.

use odstore_domain::HeaderList;

use super::changeset::parse_changeset;
use super::translator::translate;
use super::types::{BatchEnvelope, BatchFormatError, BatchResult, Unit, CHANGESET_BOUNDARY_PREFIX};

/// Parser state threaded through one envelope parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ParserState {
    /// Set while parsing the parts of a changeset.
    pub inside_changeset: bool,
    /// Ordinal assigned to the next sub-request.
    pub next_ordinal: usize,
}

impl ParserState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_ordinal(&mut self) -> usize {
        let ordinal = self.next_ordinal;
        self.next_ordinal += 1;
        ordinal
    }
}

/// What a part's `Content-Type` says it contains.
pub(crate) enum PartKind {
    Request,
    Changeset(String),
}

/// Parses a raw `$batch` body delimited by `boundary`.
pub fn parse_envelope(body: &[u8], boundary: &str) -> BatchResult<BatchEnvelope> {
    let text = std::str::from_utf8(body)
        .map_err(|_| BatchFormatError::parse("batch body is not valid UTF-8"))?;
    let text = text.replace("\r\n", "\n");

    if !text.starts_with(&format!("--{boundary}\n")) {
        return Err(BatchFormatError::parse(format!(
            "batch body must start with --{boundary}"
        )));
    }
    if !text.trim_end().ends_with(&format!("--{boundary}--")) {
        return Err(BatchFormatError::parse(format!(
            "batch body must end with --{boundary}--"
        )));
    }

    let mut state = ParserState::new();
    let mut units = Vec::new();
    for part in split_parts(&text, boundary)? {
        let (headers, rest) = split_head(part)?;
        let unit = match part_kind(&headers, &state)? {
            PartKind::Request => Unit::Single(translate(rest, &mut state)?),
            PartKind::Changeset(nested) => {
                let requests = parse_changeset(rest, &nested, &mut state)?;
                Unit::Changeset {
                    boundary: nested,
                    requests,
                }
            }
        };
        units.push(unit);
    }

    if units.is_empty() {
        return Err(BatchFormatError::parse("batch body contains no requests"));
    }
    Ok(BatchEnvelope {
        boundary: boundary.to_string(),
        units,
    })
}

/// Splits `text` on `--boundary` delimiter lines, returning the non-blank
/// parts between them. Text before the first delimiter and after the closing
/// `--boundary--` is ignored.
pub(crate) fn split_parts<'a>(text: &'a str, boundary: &str) -> BatchResult<Vec<&'a str>> {
    let delimiter = format!("--{boundary}");
    let terminal = format!("--{boundary}--");

    let mut parts = Vec::new();
    let mut start: Option<usize> = None;
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let content = line.trim_end();
        if content == delimiter || content == terminal {
            if let Some(begin) = start {
                let part = &text[begin..offset];
                if !part.trim().is_empty() {
                    parts.push(part);
                }
            }
            if content == terminal {
                return Ok(parts);
            }
            start = Some(offset + line.len());
        }
        offset += line.len();
    }

    Err(BatchFormatError::parse(format!(
        "missing closing boundary --{boundary}--"
    )))
}

/// Splits a part at its first blank line into parsed headers and the rest.
pub(crate) fn split_head(part: &str) -> BatchResult<(HeaderList, &str)> {
    let (head, rest) = part
        .split_once("\n\n")
        .ok_or_else(|| BatchFormatError::header("part has no header block"))?;
    Ok((parse_headers(head), rest))
}

/// Parses `Name: value` lines. Lines without a colon are ignored.
pub(crate) fn parse_headers(block: &str) -> HeaderList {
    block
        .lines()
        .filter_map(|line| line.split_once(':'))
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

/// Classifies a part by its `Content-Type`.
pub(crate) fn part_kind(headers: &HeaderList, state: &ParserState) -> BatchResult<PartKind> {
    let content_type = headers
        .get("Content-Type")
        .ok_or_else(|| BatchFormatError::header("part has no Content-Type"))?;
    let lowered = content_type.to_ascii_lowercase();

    if lowered.starts_with("application/http") {
        return Ok(PartKind::Request);
    }
    if lowered.starts_with("multipart/mixed") {
        if state.inside_changeset {
            return Err(BatchFormatError::ChangesetNest);
        }
        let nested = super::guard::boundary_from_content_type(Some(content_type))?;
        if !nested.starts_with(CHANGESET_BOUNDARY_PREFIX) {
            return Err(BatchFormatError::header(format!(
                "changeset boundary must start with {CHANGESET_BOUNDARY_PREFIX}"
            )));
        }
        return Ok(PartKind::Changeset(nested));
    }
    Err(BatchFormatError::header(format!(
        "unsupported part Content-Type '{content_type}'"
    )))
}
