use std::env;
use std::path::PathBuf;

use dirs::home_dir;
use serde_json::Value;
use tracing::warn;

use crate::error::{BalloonError, Result};
use crate::id::SnapshotId;

pub mod directory;
pub mod http;
pub mod memory;

pub use directory::{CapturedSnapshot, DirectorySnapshotStore};
pub use http::HttpSnapshotStore;
pub use memory::MemorySnapshotStore;

pub const ENV_SOURCE: &str = "BALLOON_SOURCE";
pub const ENV_WINDOW: &str = "BALLOON_WINDOW";
pub const ENV_HTTP_TIMEOUT_MS: &str = "BALLOON_HTTP_TIMEOUT_MS";

pub const INDEX_FILE_NAME: &str = "index.json";
pub const DEFAULT_WINDOW: usize = 24;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 30_000;

/// Where snapshots come from.
pub trait SnapshotStore {
    /// Human-readable location, used in logs and error messages.
    fn describe(&self) -> String;

    /// Every snapshot id the source advertises, in no particular order.
    fn list_snapshots(&self) -> Result<Vec<String>>;

    fn fetch_snapshot(&self, id: &SnapshotId) -> Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotSource {
    Directory(PathBuf),
    Http(String),
}

impl SnapshotSource {
    pub fn parse(input: &str) -> Self {
        if input.starts_with("http://") || input.starts_with("https://") {
            Self::Http(input.trim_end_matches('/').to_string())
        } else {
            Self::Directory(PathBuf::from(input))
        }
    }

    pub fn open(&self, http_timeout_ms: u64) -> Result<Box<dyn SnapshotStore>> {
        match self {
            Self::Directory(root) => Ok(Box::new(DirectorySnapshotStore::new(root))),
            Self::Http(base_url) => Ok(Box::new(HttpSnapshotStore::new(
                base_url,
                http_timeout_ms,
            )?)),
        }
    }
}

/// Values supplied on the command line. Each one that is set replaces the
/// matching environment lookup entirely.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceOverrides {
    pub source: Option<String>,
    pub window: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub source: SnapshotSource,
    pub window: usize,
    pub http_timeout_ms: u64,
}

impl SourceConfig {
    pub fn from_env_or_home(overrides: &SourceOverrides) -> Result<Self> {
        Self::from_env_with(overrides, |key| env::var(key).ok(), home_dir)
    }

    pub fn from_env_with<F, H>(overrides: &SourceOverrides, mut getter: F, home: H) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
        H: FnOnce() -> Option<PathBuf>,
    {
        // Precedence:
        // 1) --source
        // 2) BALLOON_SOURCE (URL or directory)
        // 3) XDG_DATA_HOME/balloon
        // 4) ~/.local/share/balloon
        let source_value = overrides
            .source
            .clone()
            .or_else(|| getter(ENV_SOURCE))
            .filter(|value| !value.trim().is_empty());
        let source = match source_value {
            Some(value) => SnapshotSource::parse(value.trim()),
            None => {
                let data_home = getter("XDG_DATA_HOME")
                    .filter(|value| !value.is_empty())
                    .map(PathBuf::from);
                let root = match data_home {
                    Some(path) => path.join("balloon"),
                    None => home()
                        .ok_or(BalloonError::HomeDirectoryNotFound)?
                        .join(".local/share/balloon"),
                };
                SnapshotSource::Directory(root)
            }
        };

        let window = match overrides.window {
            Some(0) => {
                return Err(BalloonError::InvalidConfig {
                    key: "--window",
                    reason: "must be at least 1".to_string(),
                });
            }
            Some(window) => window,
            None => match getter(ENV_WINDOW) {
                Some(value) => parse_window(&value)?,
                None => DEFAULT_WINDOW,
            },
        };

        let http_timeout_ms = match getter(ENV_HTTP_TIMEOUT_MS) {
            Some(value) => value
                .trim()
                .parse::<u64>()
                .map_err(|_| BalloonError::InvalidConfig {
                    key: ENV_HTTP_TIMEOUT_MS,
                    reason: format!("not a number of milliseconds: {value}"),
                })?,
            None => DEFAULT_HTTP_TIMEOUT_MS,
        };

        Ok(Self {
            source,
            window,
            http_timeout_ms,
        })
    }

    pub fn open_store(&self) -> Result<Box<dyn SnapshotStore>> {
        self.source.open(self.http_timeout_ms)
    }
}

pub fn parse_window(value: &str) -> Result<usize> {
    match value.trim().parse::<usize>() {
        Ok(window) if window > 0 => Ok(window),
        _ => Err(BalloonError::InvalidConfig {
            key: ENV_WINDOW,
            reason: format!("expected a positive integer, got {value}"),
        }),
    }
}

/// Decodes an index document: a JSON array of id strings. Non-string entries
/// are dropped with a warning.
pub(crate) fn parse_index(source_name: &str, text: &str) -> Result<Vec<String>> {
    let value =
        serde_json::from_str::<Value>(text).map_err(|err| BalloonError::IndexFetch {
            source_name: source_name.to_string(),
            reason: format!("index is not valid json: {err}"),
        })?;

    let Value::Array(entries) = value else {
        return Err(BalloonError::IndexFetch {
            source_name: source_name.to_string(),
            reason: "index is not an array".to_string(),
        });
    };

    let mut ids = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry {
            Value::String(id) => ids.push(id),
            other => warn!(source = source_name, entry = %other, "ignoring non-string index entry"),
        }
    }

    Ok(ids)
}
