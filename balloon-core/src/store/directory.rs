use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::WalkDir;

use crate::error::{BalloonError, Result};
use crate::id::SnapshotId;
use crate::parser::parse_snapshot;
use crate::store::{INDEX_FILE_NAME, SnapshotStore, parse_index};

/// A snapshot written by [`DirectorySnapshotStore::capture`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedSnapshot {
    pub id: SnapshotId,
    pub path: PathBuf,
    pub records: usize,
    pub malformed: usize,
}

/// Snapshots stored as `<root>/<id>.json`, optionally listed by
/// `<root>/index.json`.
#[derive(Debug, Clone)]
pub struct DirectorySnapshotStore {
    root: PathBuf,
}

impl DirectorySnapshotStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stores `raw` as `<id>.json` and lists the id in `index.json`.
    ///
    /// The text must decode as a snapshot; it is written unchanged so the
    /// file keeps whatever the feed sent. A missing index is seeded from the
    /// files already present.
    pub fn capture(&self, id: &SnapshotId, raw: &str) -> Result<CapturedSnapshot> {
        let parsed = parse_snapshot(id, raw)?;

        fs::create_dir_all(&self.root).map_err(|source| BalloonError::Io {
            path: self.root.clone(),
            source,
        })?;

        let mut ids = if self.index_path().exists() {
            self.list_snapshots()?
        } else {
            self.scan_ids()?
        };

        let path = self.root.join(id.file_name());
        if path.exists() {
            debug!(path = %path.display(), "replacing existing snapshot");
        }
        fs::write(&path, raw).map_err(|source| BalloonError::Io {
            path: path.clone(),
            source,
        })?;

        if !ids.iter().any(|existing| existing == id.as_str()) {
            ids.push(id.to_string());
        }
        self.write_index(&ids)?;

        info!(
            id = %id,
            records = parsed.len(),
            malformed = parsed.malformed,
            "captured snapshot"
        );

        Ok(CapturedSnapshot {
            id: id.clone(),
            path,
            records: parsed.len(),
            malformed: parsed.malformed,
        })
    }

    fn write_index(&self, ids: &[String]) -> Result<()> {
        let mut text = serde_json::to_string_pretty(ids)
            .map_err(|err| BalloonError::Serialization(err.to_string()))?;
        text.push('\n');

        let index_path = self.index_path();
        fs::write(&index_path, text).map_err(|source| BalloonError::Io {
            path: index_path,
            source,
        })
    }

    fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE_NAME)
    }

    fn scan_ids(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|err| BalloonError::IndexFetch {
                source_name: self.describe(),
                reason: err.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            if path.file_name().and_then(|name| name.to_str()) == Some(INDEX_FILE_NAME) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                ids.push(stem.to_string());
            }
        }

        Ok(ids)
    }
}

impl SnapshotStore for DirectorySnapshotStore {
    fn describe(&self) -> String {
        self.root.display().to_string()
    }

    fn list_snapshots(&self) -> Result<Vec<String>> {
        if !self.root.is_dir() {
            return Err(BalloonError::IndexFetch {
                source_name: self.describe(),
                reason: "directory does not exist".to_string(),
            });
        }

        let index_path = self.index_path();
        if !index_path.exists() {
            return self.scan_ids();
        }

        let text = fs::read_to_string(&index_path).map_err(|err| BalloonError::IndexFetch {
            source_name: index_path.display().to_string(),
            reason: err.to_string(),
        })?;
        parse_index(&index_path.display().to_string(), &text)
    }

    fn fetch_snapshot(&self, id: &SnapshotId) -> Result<String> {
        let path = self.root.join(id.file_name());
        let bytes = fs::read(&path).map_err(|source| BalloonError::Io {
            path: path.clone(),
            source,
        })?;

        String::from_utf8(bytes).map_err(|_| BalloonError::SnapshotFetch {
            id: id.to_string(),
            reason: format!("{} is not valid UTF-8", path.display()),
        })
    }
}
