use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{BalloonError, Result};
use crate::id::SnapshotId;
use crate::model::Record;

// The upstream feed writes non-standard numeric literals that serde_json rejects.
static NON_FINITE_TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"-?\b(?:NaN|Infinity)\b").expect("valid regex"));

const RECORD_ARITY: usize = 3;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSnapshot {
    pub records: Vec<Record>,
    /// Elements that were not an array of at least three values.
    pub malformed: usize,
}

impl ParsedSnapshot {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

pub fn parse_snapshot(id: &SnapshotId, raw: &str) -> Result<ParsedSnapshot> {
    let normalized = normalize_non_finite_tokens(raw);
    let value = serde_json::from_str::<Value>(&normalized).map_err(|source| {
        BalloonError::SnapshotSyntax {
            id: id.to_string(),
            source,
        }
    })?;

    let elements = match value {
        Value::Array(elements) => elements,
        other => {
            return Err(BalloonError::SnapshotFormat {
                id: id.to_string(),
                found: value_kind(&other),
            });
        }
    };

    let mut parsed = ParsedSnapshot {
        records: Vec::with_capacity(elements.len()),
        malformed: 0,
    };

    for element in &elements {
        match parse_record(element) {
            Some(record) => parsed.records.push(record),
            None => {
                parsed.malformed += 1;
                parsed.records.push(Record::missing());
            }
        }
    }

    Ok(parsed)
}

pub fn normalize_non_finite_tokens(raw: &str) -> Cow<'_, str> {
    NON_FINITE_TOKEN_RE.replace_all(raw, "null")
}

fn parse_record(element: &Value) -> Option<Record> {
    let fields = element.as_array()?;
    if fields.len() < RECORD_ARITY {
        return None;
    }

    Some(Record::new(
        finite_number(&fields[0]),
        finite_number(&fields[1]),
        finite_number(&fields[2]),
    ))
}

fn finite_number(value: &Value) -> Option<f64> {
    value.as_f64().filter(|number| number.is_finite())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
