//! OData resource path grammar.
//!
//! ```text
//! path       = ["/"] entity-set [key [navigation / links]]
//! navigation = "/_" entity-set [key]
//! links      = "/$links/_" entity-set [key]
//! key        = "('" chars "')"        ; '' escapes a quote
//! entity-set = alnum *(alnum / "_" / "-")
//! ```

use std::fmt;

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while},
    character::complete::{char, satisfy},
    combinator::{all_consuming, map, opt, recognize, value, verify},
    error::{context, VerboseError},
    multi::fold_many0,
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use crate::error::{DomainError, DomainResult};

type Res<'a, T> = IResult<&'a str, T, VerboseError<&'a str>>;

/// Structural shape of a resource path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathShape {
    Collection,
    Entity,
    Navigation,
    Links,
}

/// A parsed resource path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourcePath {
    /// `Set`
    Collection { entity_set: String },
    /// `Set('key')`
    Entity { entity_set: String, key: String },
    /// `Set('key')/_Target` with an optional (invalid at execution) key.
    Navigation {
        entity_set: String,
        key: String,
        target: String,
        target_key: Option<String>,
    },
    /// `Set('key')/$links/_Target` with an optional target key.
    Links {
        entity_set: String,
        key: String,
        target: String,
        target_key: Option<String>,
    },
}

impl ResourcePath {
    /// Parses a path (without query string).
    pub fn parse(input: &str) -> DomainResult<Self> {
        let trimmed = input.strip_prefix('/').unwrap_or(input);
        match all_consuming(resource_path)(trimmed) {
            Ok((_, path)) => Ok(path),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let message = e
                    .errors
                    .iter()
                    .find_map(|(_, kind)| match kind {
                        nom::error::VerboseErrorKind::Context(ctx) => Some(format!("expected {ctx}")),
                        _ => None,
                    })
                    .unwrap_or_else(|| "unrecognised path".to_string());
                Err(DomainError::InvalidPath {
                    path: input.to_string(),
                    message,
                })
            }
            Err(nom::Err::Incomplete(_)) => Err(DomainError::InvalidPath {
                path: input.to_string(),
                message: "incomplete path".to_string(),
            }),
        }
    }

    pub fn shape(&self) -> PathShape {
        match self {
            ResourcePath::Collection { .. } => PathShape::Collection,
            ResourcePath::Entity { .. } => PathShape::Entity,
            ResourcePath::Navigation { .. } => PathShape::Navigation,
            ResourcePath::Links { .. } => PathShape::Links,
        }
    }

    /// The entity set addressed by the first segment.
    pub fn entity_set(&self) -> &str {
        match self {
            ResourcePath::Collection { entity_set }
            | ResourcePath::Entity { entity_set, .. }
            | ResourcePath::Navigation { entity_set, .. }
            | ResourcePath::Links { entity_set, .. } => entity_set,
        }
    }

    /// The key of the first segment, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            ResourcePath::Collection { .. } => None,
            ResourcePath::Entity { key, .. }
            | ResourcePath::Navigation { key, .. }
            | ResourcePath::Links { key, .. } => Some(key),
        }
    }

    /// True for navigation and `$links` paths.
    pub fn is_multi_segment(&self) -> bool {
        matches!(self.shape(), PathShape::Navigation | PathShape::Links)
    }
}

fn write_key(f: &mut fmt::Formatter<'_>, key: &str) -> fmt::Result {
    write!(f, "('{}')", key.replace('\'', "''"))
}

impl fmt::Display for ResourcePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity_set())?;
        if let Some(key) = self.key() {
            write_key(f, key)?;
        }
        let (segment, target, target_key) = match self {
            ResourcePath::Navigation {
                target, target_key, ..
            } => ("/_", target, target_key),
            ResourcePath::Links {
                target, target_key, ..
            } => ("/$links/_", target, target_key),
            _ => return Ok(()),
        };
        write!(f, "{segment}{target}")?;
        if let Some(key) = target_key {
            write_key(f, key)?;
        }
        Ok(())
    }
}

/// Splits a query string into `name=value` pairs. A bare name yields an
/// empty value.
pub fn parse_query(query: &str) -> impl Iterator<Item = (&str, &str)> {
    query
        .split('&')
        .filter(|part| !part.is_empty())
        .map(|part| part.split_once('=').unwrap_or((part, "")))
}

// ============ Helper Parsers ============

fn entity_set_name(input: &str) -> Res<'_, &str> {
    context(
        "entity set name",
        recognize(pair(
            satisfy(|c| c.is_ascii_alphanumeric()),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
        )),
    )(input)
}

/// Parse the inside of a quoted key, unescaping `''`.
fn quoted_chars(input: &str) -> Res<'_, String> {
    fold_many0(
        alt((value("'", tag("''")), is_not("'"))),
        String::new,
        |mut acc, piece| {
            acc.push_str(piece);
            acc
        },
    )(input)
}

fn key(input: &str) -> Res<'_, String> {
    context(
        "quoted key",
        verify(
            delimited(tag("('"), quoted_chars, tag("')")),
            |k: &String| !k.is_empty(),
        ),
    )(input)
}

fn navigation_target(input: &str) -> Res<'_, (&str, Option<String>)> {
    context(
        "navigation property",
        preceded(char('_'), pair(entity_set_name, opt(key))),
    )(input)
}

enum Tail<'a> {
    Navigation(&'a str, Option<String>),
    Links(&'a str, Option<String>),
}

fn tail(input: &str) -> Res<'_, Tail<'_>> {
    alt((
        map(
            preceded(tag("/$links/"), navigation_target),
            |(target, key)| Tail::Links(target, key),
        ),
        map(preceded(char('/'), navigation_target), |(target, key)| {
            Tail::Navigation(target, key)
        }),
    ))(input)
}

fn resource_path(input: &str) -> Res<'_, ResourcePath> {
    let (rest, (entity_set, keyed)) =
        tuple((entity_set_name, opt(pair(key, opt(tail)))))(input)?;
    let entity_set = entity_set.to_string();

    let path = match keyed {
        None => ResourcePath::Collection { entity_set },
        Some((key, None)) => ResourcePath::Entity { entity_set, key },
        Some((key, Some(Tail::Navigation(target, target_key)))) => ResourcePath::Navigation {
            entity_set,
            key,
            target: target.to_string(),
            target_key,
        },
        Some((key, Some(Tail::Links(target, target_key)))) => ResourcePath::Links {
            entity_set,
            key,
            target: target.to_string(),
            target_key,
        },
    };
    Ok((rest, path))
}
