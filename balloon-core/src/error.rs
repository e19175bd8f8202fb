use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BalloonError {
    #[error("failed to fetch snapshot index from {source_name}: {reason}")]
    IndexFetch { source_name: String, reason: String },

    #[error("failed to fetch snapshot {id}: {reason}")]
    SnapshotFetch { id: String, reason: String },

    #[error("failed to fetch feed {location}: {reason}")]
    FeedFetch { location: String, reason: String },

    #[error("snapshot {id} is not valid json: {source}")]
    SnapshotSyntax {
        id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot {id} is not an array of records (found {found})")]
    SnapshotFormat { id: String, found: &'static str },

    #[error("snapshot {id} has {actual} records, expected {expected}")]
    CountMismatch {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("invalid snapshot id: {0}")]
    InvalidSnapshotId(String),

    #[error("invalid selection: {0}")]
    InvalidSelection(String),

    #[error("invalid config {key}: {reason}")]
    InvalidConfig { key: &'static str, reason: String },

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("cannot determine home directory")]
    HomeDirectoryNotFound,

    #[error("assistant request failed: {0}")]
    Assistant(String),

    #[error("i/o error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("http error on {url}: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

pub type Result<T> = std::result::Result<T, BalloonError>;
