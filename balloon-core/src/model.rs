use std::fmt;

use serde::{Serialize, Serializer};

use crate::id::SnapshotId;

/// One object's raw sample within a snapshot. `None` marks a missing field,
/// which is distinct from an observed zero.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Record {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
}

impl Record {
    pub fn new(latitude: Option<f64>, longitude: Option<f64>, altitude: Option<f64>) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    pub fn missing() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.position().is_some()
    }

    pub fn position(&self) -> Option<Position> {
        Some(Position {
            latitude: self.latitude?,
            longitude: self.longitude?,
            altitude: self.altitude?,
        })
    }

    /// Fills every missing field from `fallback`, keeping observed fields.
    pub fn fill_from(&self, fallback: &Position) -> Position {
        Position {
            latitude: self.latitude.unwrap_or(fallback.latitude),
            longitude: self.longitude.unwrap_or(fallback.longitude),
            altitude: self.altitude.unwrap_or(fallback.altitude),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}, {}", self.latitude, self.longitude, self.altitude)
    }
}

/// Most recent fully valid position known for one index, stamped with the
/// timestamp of the history entry that produced it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastValid {
    pub position: Position,
    pub timestamp: EntryTimestamp,
}

/// A repaired entry keeps the full timestamp it was carried from, so a run
/// of gaps reads `C (from B (from A))`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryTimestamp {
    Observed(SnapshotId),
    CarriedForward {
        snapshot: SnapshotId,
        source: Box<EntryTimestamp>,
    },
}

impl EntryTimestamp {
    pub fn carried(snapshot: SnapshotId, source: EntryTimestamp) -> Self {
        Self::CarriedForward {
            snapshot,
            source: Box::new(source),
        }
    }

    pub fn snapshot(&self) -> &SnapshotId {
        match self {
            Self::Observed(snapshot) | Self::CarriedForward { snapshot, .. } => snapshot,
        }
    }

    pub fn carried_from(&self) -> Option<&EntryTimestamp> {
        match self {
            Self::Observed(_) => None,
            Self::CarriedForward { source, .. } => Some(source),
        }
    }

    /// Snapshot the carried values were last actually observed in.
    pub fn origin(&self) -> &SnapshotId {
        match self {
            Self::Observed(snapshot) => snapshot,
            Self::CarriedForward { source, .. } => source.origin(),
        }
    }
}

impl Serialize for EntryTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl fmt::Display for EntryTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Observed(snapshot) => write!(f, "{snapshot}"),
            Self::CarriedForward { snapshot, source } => write!(f, "{snapshot} (from {source})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub position: Position,
    pub timestamp: EntryTimestamp,
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.position, self.timestamp)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    InvalidId,
    Fetch,
    Syntax,
    Format,
    CountMismatch,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidId => write!(f, "invalid id"),
            Self::Fetch => write!(f, "fetch failed"),
            Self::Syntax => write!(f, "syntax error"),
            Self::Format => write!(f, "format error"),
            Self::CountMismatch => write!(f, "count mismatch"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedSnapshot {
    pub id: String,
    pub reason: SkipReason,
    pub detail: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub considered: Vec<SnapshotId>,
    pub ingested: Vec<SnapshotId>,
    pub skipped: Vec<SkippedSnapshot>,
    pub repaired_entries: usize,
    pub dropped_samples: usize,
    pub malformed_records: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackEntryView {
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: f64,
    pub timestamp: String,
    pub snapshot: SnapshotId,
    pub carried_from: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackView {
    pub index: usize,
    pub last_valid: Option<LastValid>,
    pub entries: Vec<TrackEntryView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TracksView {
    Tracks {
        expected_count: Option<usize>,
        report: IngestReport,
        tracks: Vec<TrackView>,
    },
    TooManySelected {
        selected: usize,
        limit: usize,
    },
}
