#![allow(clippy::result_large_err)] // Path helpers return AppError so definition validation can surface them unchanged.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::OnceLock;

fn segment_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([A-Za-z_][A-Za-z0-9_\-]*)((?:\[\d+\])*)$").expect("static segment regex")
    })
}

/// One step through a JSON document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

/// Reference into the execution context, written as `$.detail.object.key` or
/// `$.classificationResult[0].name`. `$` alone addresses the whole document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferencePath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl ReferencePath {
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        let rest = trimmed.strip_prefix('$').ok_or_else(|| invalid(raw, "must start with '$'"))?;
        let mut segments = Vec::new();
        if !rest.is_empty() {
            let rest = rest
                .strip_prefix('.')
                .ok_or_else(|| invalid(raw, "expected '.' after '$'"))?;
            for part in rest.split('.') {
                let captures = segment_pattern()
                    .captures(part)
                    .ok_or_else(|| invalid(raw, &format!("bad segment '{}'", part)))?;
                segments.push(PathSegment::Field(captures[1].to_string()));
                let indexes = captures.get(2).map(|m| m.as_str()).unwrap_or("");
                for index in indexes
                    .split(|c| c == '[' || c == ']')
                    .filter(|s| !s.is_empty())
                {
                    let index = index
                        .parse::<usize>()
                        .map_err(|_| invalid(raw, &format!("bad index '{}'", index)))?;
                    segments.push(PathSegment::Index(index));
                }
            }
        }
        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// True when the path only walks object fields, which is required for write targets.
    pub fn is_writable(&self) -> bool {
        self.segments
            .iter()
            .all(|segment| matches!(segment, PathSegment::Field(_)))
    }

    pub fn get<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        let mut current = document;
        for segment in &self.segments {
            current = match segment {
                PathSegment::Field(name) => current.as_object()?.get(name)?,
                PathSegment::Index(index) => current.as_array()?.get(*index)?,
            };
        }
        Some(current)
    }

    /// Write `value` at this path, creating intermediate objects as needed.
    pub fn set(&self, document: &mut Value, value: Value) -> Result<(), AppError> {
        if !self.is_writable() {
            return Err(invalid(&self.raw, "write targets cannot contain indexes"));
        }
        let Some((last, parents)) = self.segments.split_last() else {
            *document = value;
            return Ok(());
        };
        let mut current = document;
        for segment in parents {
            if let PathSegment::Field(name) = segment {
                current = ensure_object(current)
                    .entry(name.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
            }
        }
        if let PathSegment::Field(name) = last {
            ensure_object(current).insert(name.clone(), value);
        }
        Ok(())
    }
}

impl fmt::Display for ReferencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

fn invalid(raw: &str, reason: &str) -> AppError {
    AppError::new(
        ErrorCategory::DefinitionError,
        format!("invalid reference path '{}': {}", raw, reason),
    )
    .with_code("SC-DEF-004")
}

/// Resolve `path` against `document`, failing with `MalformedInputError` when absent.
pub fn require<'a>(path: &ReferencePath, document: &'a Value) -> Result<&'a Value, AppError> {
    path.get(document).ok_or_else(|| {
        AppError::new(
            ErrorCategory::MalformedInputError,
            format!("field {} is missing from the execution context", path),
        )
        .with_code("SC-INPUT-001")
    })
}
