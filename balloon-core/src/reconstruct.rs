//! Chronological fold of snapshots into per-object tracks.
//!
//! Object identity is positional: index `i` in one snapshot is the same
//! balloon as index `i` in every other snapshot. The first snapshot that
//! parses fixes the expected record count, and any later snapshot with a
//! different count is rejected as a whole so a reshaped file can never shift
//! identities.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::error::{BalloonError, Result};
use crate::id::SnapshotId;
use crate::model::{
    EntryTimestamp, HistoryEntry, IngestReport, LastValid, Record, SkipReason, SkippedSnapshot,
};
use crate::parser::parse_snapshot;
use crate::store::SnapshotStore;

#[derive(Debug, Clone, Default, PartialEq)]
struct ObjectTrack {
    last_valid: Option<LastValid>,
    history: Vec<HistoryEntry>,
}

/// Everything one ingestion run has learned. Created empty, owned by the run,
/// never merged with a previous run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestionContext {
    expected_count: Option<usize>,
    tracks: Vec<ObjectTrack>,
    report: IngestReport,
}

impl IngestionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expected_count(&self) -> Option<usize> {
        self.expected_count
    }

    pub fn object_count(&self) -> usize {
        self.tracks.len()
    }

    pub fn report(&self) -> &IngestReport {
        &self.report
    }

    pub fn last_valid(&self, index: usize) -> Option<&LastValid> {
        self.tracks
            .get(index)
            .and_then(|track| track.last_valid.as_ref())
    }

    /// Entries for `index` in processing order; empty for unknown indices.
    pub fn history(&self, index: usize) -> &[HistoryEntry] {
        self.tracks
            .get(index)
            .map_or(&[], |track| track.history.as_slice())
    }

    /// Indices with at least one history entry, ascending.
    pub fn tracked_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, track)| !track.history.is_empty())
            .map(|(index, _)| index)
    }

    /// Parses `raw` and folds it in. Failures are recorded in the report and
    /// returned; the context is left untouched by a failed snapshot.
    pub fn apply(&mut self, id: &SnapshotId, raw: &str) -> Result<usize> {
        let parsed = match parse_snapshot(id, raw) {
            Ok(parsed) => parsed,
            Err(err) => {
                self.record_skip(id.as_str(), &err);
                return Err(err);
            }
        };

        let appended = self.apply_records(id, &parsed.records)?;
        self.report.malformed_records += parsed.malformed;
        Ok(appended)
    }

    /// Folds already-parsed records in. Returns the number of history entries
    /// appended.
    pub fn apply_records(&mut self, id: &SnapshotId, records: &[Record]) -> Result<usize> {
        let expected = match self.expected_count {
            Some(expected) => expected,
            None => {
                self.expected_count = Some(records.len());
                self.tracks = vec![ObjectTrack::default(); records.len()];
                records.len()
            }
        };

        if records.len() != expected {
            let err = BalloonError::CountMismatch {
                id: id.to_string(),
                expected,
                actual: records.len(),
            };
            self.record_skip(id.as_str(), &err);
            return Err(err);
        }

        let mut appended = 0;
        for (record, track) in records.iter().zip(self.tracks.iter_mut()) {
            let (position, timestamp) = match (record.position(), &track.last_valid) {
                (Some(position), _) => (position, EntryTimestamp::Observed(id.clone())),
                (None, Some(last)) => (
                    record.fill_from(&last.position),
                    EntryTimestamp::carried(id.clone(), last.timestamp.clone()),
                ),
                (None, None) => {
                    self.report.dropped_samples += 1;
                    continue;
                }
            };

            if timestamp.carried_from().is_some() {
                self.report.repaired_entries += 1;
            }

            track.last_valid = Some(LastValid {
                position,
                timestamp: timestamp.clone(),
            });
            track.history.push(HistoryEntry {
                position,
                timestamp,
            });
            appended += 1;
        }

        self.report.ingested.push(id.clone());
        debug!(snapshot = %id, records = records.len(), appended, "applied snapshot");
        Ok(appended)
    }

    fn record_skip(&mut self, id: &str, err: &BalloonError) {
        let reason = match err {
            BalloonError::InvalidSnapshotId(_) => SkipReason::InvalidId,
            BalloonError::SnapshotSyntax { .. } => SkipReason::Syntax,
            BalloonError::SnapshotFormat { .. } => SkipReason::Format,
            BalloonError::CountMismatch { .. } => SkipReason::CountMismatch,
            _ => SkipReason::Fetch,
        };
        warn!(snapshot = id, %reason, error = %err, "skipping snapshot");
        self.report.skipped.push(SkippedSnapshot {
            id: id.to_string(),
            reason,
            detail: err.to_string(),
        });
    }
}

/// Sorts and de-duplicates the advertised ids and keeps the most recent
/// `window` of them, oldest first. Ids that are unusable as a path segment
/// come back separately, limited to those that sort into the window.
pub fn recent_window(
    ids: Vec<String>,
    window: usize,
) -> (Vec<SnapshotId>, Vec<(String, BalloonError)>) {
    let unique = ids.into_iter().collect::<BTreeSet<_>>();

    let mut valid = Vec::with_capacity(unique.len());
    let mut rejected = Vec::new();
    for raw in unique {
        match SnapshotId::parse(&raw) {
            Ok(id) => valid.push(id),
            Err(err) => rejected.push((raw, err)),
        }
    }

    let start = valid.len().saturating_sub(window);
    let window_ids = valid.split_off(start);

    // Nothing was cut when no valid id fell before the window.
    if let Some(oldest_kept) = window_ids.first()
        && !valid.is_empty()
    {
        rejected.retain(|(raw, _)| raw.as_str() > oldest_kept.as_str());
    }

    (window_ids, rejected)
}

/// Runs one ingestion: list, window, then fetch and fold each snapshot in
/// ascending order. Only a failure to obtain the index aborts the run.
pub fn ingest(store: &dyn SnapshotStore, window: usize) -> Result<IngestionContext> {
    let ids = store.list_snapshots()?;
    let advertised = ids.len();
    let (window_ids, rejected) = recent_window(ids, window);

    let mut context = IngestionContext::new();
    for (raw, err) in &rejected {
        context.record_skip(raw, err);
    }
    context.report.considered = window_ids.clone();

    for id in &window_ids {
        let raw = match store.fetch_snapshot(id) {
            Ok(raw) => raw,
            Err(err) => {
                context.record_skip(id.as_str(), &err);
                continue;
            }
        };

        // Failures are already recorded in the report.
        let _ = context.apply(id, &raw);
    }

    info!(
        source = %store.describe(),
        advertised,
        considered = context.report.considered.len(),
        ingested = context.report.ingested.len(),
        skipped = context.report.skipped.len(),
        objects = context.object_count(),
        "ingestion finished"
    );

    Ok(context)
}

#[cfg(test)]
mod tests {
    use crate::id::SnapshotId;
    use crate::model::{EntryTimestamp, Position, SkipReason};
    use crate::reconstruct::{IngestionContext, ingest, recent_window};
    use crate::store::MemorySnapshotStore;

    fn id(raw: &str) -> SnapshotId {
        SnapshotId::parse(raw).expect("id")
    }

    fn position(latitude: f64, longitude: f64, altitude: f64) -> Position {
        Position {
            latitude,
            longitude,
            altitude,
        }
    }

    fn labels(context: &IngestionContext, index: usize) -> Vec<String> {
        context
            .history(index)
            .iter()
            .map(|entry| entry.timestamp.to_string())
            .collect()
    }

    #[test]
    fn carries_forward_last_valid_values() {
        let store = MemorySnapshotStore::new()
            .with_snapshot("A", "[[1,2,3],[4,5,6]]")
            .with_snapshot("B", "[[NaN,NaN,NaN],[7,8,9]]");

        let context = ingest(&store, 24).expect("ingest");
        assert_eq!(context.expected_count(), Some(2));

        let first = context.history(0);
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].position, position(1.0, 2.0, 3.0));
        assert_eq!(first[1].position, position(1.0, 2.0, 3.0));
        assert_eq!(labels(&context, 0), vec!["A", "B (from A)"]);

        let second = context.history(1);
        assert_eq!(second[0].position, position(4.0, 5.0, 6.0));
        assert_eq!(second[1].position, position(7.0, 8.0, 9.0));
        assert_eq!(labels(&context, 1), vec!["A", "B"]);

        assert_eq!(context.report().repaired_entries, 1);
    }

    #[test]
    fn repairs_individual_fields() {
        let store = MemorySnapshotStore::new()
            .with_snapshot("A", "[[1,2,3]]")
            .with_snapshot("B", "[[10,20,NaN]]");

        let context = ingest(&store, 24).expect("ingest");
        let history = context.history(0);
        assert_eq!(history[1].position, position(10.0, 20.0, 3.0));
        assert_eq!(
            history[1].timestamp,
            EntryTimestamp::carried(id("B"), EntryTimestamp::Observed(id("A")))
        );

        let last = context.last_valid(0).expect("last valid");
        assert_eq!(last.position, position(10.0, 20.0, 3.0));
        assert_eq!(last.timestamp, history[1].timestamp);
    }

    #[test]
    fn consecutive_gaps_nest_their_sources() {
        let store = MemorySnapshotStore::new()
            .with_snapshot("A", "[[1,2,3]]")
            .with_snapshot("B", "[[NaN,NaN,NaN]]")
            .with_snapshot("C", "[[NaN,NaN,NaN]]")
            .with_snapshot("D", "[[4,NaN,6]]");

        let context = ingest(&store, 24).expect("ingest");
        assert_eq!(
            labels(&context, 0),
            vec![
                "A",
                "B (from A)",
                "C (from B (from A))",
                "D (from C (from B (from A)))",
            ]
        );

        let history = context.history(0);
        assert_eq!(history[2].position, position(1.0, 2.0, 3.0));
        assert_eq!(history[3].position, position(4.0, 2.0, 6.0));
        assert_eq!(history[2].timestamp.origin(), &id("A"));
    }

    #[test]
    fn observed_sample_ends_the_nesting() {
        let store = MemorySnapshotStore::new()
            .with_snapshot("A", "[[1,2,3]]")
            .with_snapshot("B", "[[NaN,NaN,NaN]]")
            .with_snapshot("C", "[[7,8,9]]")
            .with_snapshot("D", "[[NaN,NaN,NaN]]");

        let context = ingest(&store, 24).expect("ingest");
        assert_eq!(
            labels(&context, 0),
            vec!["A", "B (from A)", "C", "D (from C)"]
        );
    }

    #[test]
    fn never_valid_index_gets_no_entries() {
        let store = MemorySnapshotStore::new()
            .with_snapshot("A", "[[NaN,1,2],[1,2,3]]")
            .with_snapshot("B", "[[5,NaN,2],[1,2,3]]")
            .with_snapshot("C", "[[5,6,7],[1,2,3]]");

        let context = ingest(&store, 24).expect("ingest");
        assert_eq!(labels(&context, 0), vec!["C"]);
        assert_eq!(context.history(1).len(), 3);
        assert_eq!(context.report().dropped_samples, 2);
        assert_eq!(context.tracked_indices().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn zero_is_a_valid_value() {
        let store = MemorySnapshotStore::new().with_snapshot("A", "[[0,0,0]]");

        let context = ingest(&store, 24).expect("ingest");
        assert_eq!(context.history(0)[0].position, position(0.0, 0.0, 0.0));
        assert_eq!(labels(&context, 0), vec!["A"]);
    }

    #[test]
    fn count_mismatch_skips_whole_snapshot() {
        let store = MemorySnapshotStore::new()
            .with_snapshot("A", "[[1,2,3],[4,5,6]]")
            .with_snapshot("B", "[[1,1,1],[2,2,2],[3,3,3]]")
            .with_snapshot("C", "[[7,8,9],[NaN,NaN,NaN]]");

        let context = ingest(&store, 24).expect("ingest");
        assert_eq!(context.expected_count(), Some(2));
        assert_eq!(context.object_count(), 2);
        assert_eq!(labels(&context, 0), vec!["A", "C"]);
        assert_eq!(labels(&context, 1), vec!["A", "C (from A)"]);

        let report = context.report();
        assert_eq!(report.ingested, vec![id("A"), id("C")]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].id, "B");
        assert_eq!(report.skipped[0].reason, SkipReason::CountMismatch);
    }

    #[test]
    fn bad_snapshots_are_skipped_not_fatal() {
        let store = MemorySnapshotStore::new()
            .with_index(["A", "B", "C", "D", "E"])
            .with_snapshot("A", "[[1,2,3]]")
            .with_snapshot("B", "[[1,2,")
            .with_snapshot("C", r#"{"not": "an array"}"#)
            .with_snapshot("E", "[[4,5,6]]");

        let context = ingest(&store, 24).expect("ingest");
        assert_eq!(labels(&context, 0), vec!["A", "E"]);

        let reasons = context
            .report()
            .skipped
            .iter()
            .map(|skipped| (skipped.id.as_str(), skipped.reason))
            .collect::<Vec<_>>();
        assert_eq!(
            reasons,
            vec![
                ("B", SkipReason::Syntax),
                ("C", SkipReason::Format),
                ("D", SkipReason::Fetch),
            ]
        );
    }

    #[test]
    fn first_parsed_snapshot_sets_expected_count() {
        let store = MemorySnapshotStore::new()
            .with_snapshot("A", "garbage")
            .with_snapshot("B", "[[1,2,3],[4,5,6],[7,8,9]]")
            .with_snapshot("C", "[[1,2,3]]");

        let context = ingest(&store, 24).expect("ingest");
        assert_eq!(context.expected_count(), Some(3));
        assert_eq!(context.report().ingested, vec![id("B")]);
    }

    #[test]
    fn malformed_elements_only_affect_their_position() {
        let store = MemorySnapshotStore::new()
            .with_snapshot("A", "[[1,2,3],[4,5,6]]")
            .with_snapshot("B", r#"[[1,2],[7,8,9]]"#);

        let context = ingest(&store, 24).expect("ingest");
        assert_eq!(labels(&context, 0), vec!["A", "B (from A)"]);
        assert_eq!(labels(&context, 1), vec!["A", "B"]);
        assert_eq!(context.report().malformed_records, 1);
    }

    #[test]
    fn index_failure_aborts_the_run() {
        let store = MemorySnapshotStore::new()
            .with_snapshot("A", "[[1,2,3]]")
            .with_unavailable_index();

        let err = ingest(&store, 24).expect_err("must fail");
        assert!(format!("{err}").contains("failed to fetch snapshot index"));
    }

    #[test]
    fn processes_only_the_most_recent_window() {
        let mut store = MemorySnapshotStore::new();
        for hour in 0..30 {
            store = store.with_snapshot(format!("20250214-{hour:02}00"), format!("[[{hour},0,0]]"));
        }

        let context = ingest(&store, 24).expect("ingest");
        let history = context.history(0);
        assert_eq!(history.len(), 24);
        assert_eq!(history[0].timestamp.to_string(), "20250214-0600");
        assert_eq!(history[23].timestamp.to_string(), "20250214-2900");
        assert_eq!(context.report().considered.len(), 24);
    }

    #[test]
    fn window_sorts_dedups_and_rejects_unsafe_ids() {
        let ids = ["c", "a", "../x", "b", "a"]
            .into_iter()
            .map(ToString::to_string)
            .collect();

        let (window, rejected) = recent_window(ids, 3);
        assert_eq!(window, vec![id("a"), id("b"), id("c")]);
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].0, "../x");
    }

    #[test]
    fn unsafe_ids_older_than_the_window_are_not_reported() {
        let ids = ["a", "../old", "b", "b c", "c", "c~"]
            .into_iter()
            .map(ToString::to_string)
            .collect();

        let (window, rejected) = recent_window(ids, 2);
        assert_eq!(window, vec![id("b"), id("c")]);
        let rejected = rejected.iter().map(|(raw, _)| raw.as_str()).collect::<Vec<_>>();
        assert_eq!(rejected, vec!["b c", "c~"]);
    }

    #[test]
    fn report_omits_unsafe_ids_outside_the_window() {
        let store = MemorySnapshotStore::new()
            .with_index(["20250214-0800", "2025/02/14-0830", "20250214-0900", "20250214-1000"])
            .with_snapshot("20250214-0800", "[[1,2,3]]")
            .with_snapshot("20250214-0900", "[[1,2,3]]")
            .with_snapshot("20250214-1000", "[[1,2,3]]");

        let context = ingest(&store, 2).expect("ingest");
        assert!(context.report().skipped.is_empty());
        assert_eq!(context.report().ingested, vec![id("20250214-0900"), id("20250214-1000")]);
    }

    #[test]
    fn rerunning_is_idempotent() {
        let store = MemorySnapshotStore::new()
            .with_snapshot("A", "[[1,2,3],[NaN,5,6]]")
            .with_snapshot("B", "[[NaN,2,3],[4,5,6]]")
            .with_snapshot("C", "[[1,2,3]]");

        let first = ingest(&store, 24).expect("ingest");
        let second = ingest(&store, 24).expect("ingest");
        assert_eq!(first, second);
    }

    #[test]
    fn latest_entry_matches_last_valid() {
        let store = MemorySnapshotStore::new()
            .with_snapshot("A", "[[1,2,3],[NaN,NaN,NaN]]")
            .with_snapshot("B", "[[NaN,9,NaN],[4,5,6]]");

        let context = ingest(&store, 24).expect("ingest");
        for index in context.tracked_indices() {
            let latest = context.history(index).last().expect("entry");
            let last = context.last_valid(index).expect("last valid");
            assert_eq!(latest.position, last.position);
            assert_eq!(latest.timestamp, last.timestamp);
            assert!(context.history(index).len() <= context.report().ingested.len());
        }
    }
}
