use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::error::{BalloonError, Result};

// Ids end up as a path segment or URL segment, so only a conservative
// character set is accepted.
static SNAPSHOT_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9A-Za-z][0-9A-Za-z_.\-]*$").expect("valid regex"));

/// Chronologically sortable snapshot identifier, e.g. `20250214-0930`.
///
/// Ordering is plain lexical ordering of the underlying string, which is what
/// the snapshot index relies on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SnapshotId(String);

impl SnapshotId {
    pub fn parse(input: &str) -> Result<Self> {
        input.parse()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.0)
    }
}

impl FromStr for SnapshotId {
    type Err = BalloonError;

    fn from_str(input: &str) -> Result<Self> {
        if !SNAPSHOT_ID_RE.is_match(input) || input.contains("..") {
            return Err(BalloonError::InvalidSnapshotId(input.to_string()));
        }

        Ok(Self(input.to_string()))
    }
}

impl fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
