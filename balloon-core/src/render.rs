use std::collections::BTreeSet;
use std::fmt;

use crate::error::{BalloonError, Result};
use crate::model::{TrackEntryView, TrackView, TracksView};
use crate::reconstruct::IngestionContext;
use crate::selection::{MAX_SELECTION, Selection};

const NO_POSITIONS_PLACEHOLDER: &str = "_No valid positions recorded._";

/// History dump for a selection, or the placeholder shown when the selection
/// is too large to serialize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transcript {
    Rendered(String),
    TooManySelected { selected: usize },
}

impl Transcript {
    pub fn is_rendered(&self) -> bool {
        matches!(self, Self::Rendered(_))
    }
}

impl fmt::Display for Transcript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rendered(text) => f.write_str(text),
            Self::TooManySelected { selected } => writeln!(
                f,
                "Too many balloons selected ({selected} > {MAX_SELECTION})."
            ),
        }
    }
}

pub fn render_transcript(selection: &Selection, context: &IngestionContext) -> Transcript {
    if selection.exceeds_limit() {
        return Transcript::TooManySelected {
            selected: selection.len(),
        };
    }

    let mut output = String::new();
    output.push_str("# Balloon Transcript\n\n");
    output.push_str(&format!("- Selected: {}\n\n", selection.len()));

    if selection.is_empty() {
        output.push_str("_No balloons selected._\n");
        return Transcript::Rendered(output);
    }

    for index in selection.iter() {
        output.push_str(&format!("## Balloon {index}\n\n"));

        let history = context.history(index);
        if history.is_empty() {
            output.push_str(NO_POSITIONS_PLACEHOLDER);
            output.push_str("\n\n");
            continue;
        }

        for (position, entry) in history.iter().enumerate() {
            output.push_str(&format!("{}. {entry}\n", position + 1));
        }
        output.push('\n');
    }

    Transcript::Rendered(output)
}

/// Run summary plus the latest known position of every balloon with at least
/// `min_points` entries.
pub fn render_overview(context: &IngestionContext, min_points: usize) -> String {
    let report = context.report();

    let mut output = String::new();
    output.push_str("# Balloon Tracks\n\n");
    output.push_str(&format!(
        "- Snapshots considered: {}\n",
        report.considered.len()
    ));
    output.push_str(&format!("- Snapshots ingested: {}\n", report.ingested.len()));
    output.push_str(&format!("- Snapshots skipped: {}\n", report.skipped.len()));
    if let Some(expected) = context.expected_count() {
        output.push_str(&format!("- Records per snapshot: {expected}\n"));
    }
    output.push_str(&format!("- Repaired entries: {}\n", report.repaired_entries));
    output.push_str(&format!(
        "- Unrepairable samples: {}\n\n",
        report.dropped_samples
    ));

    if report.ingested.is_empty() {
        output.push_str("_No snapshots ingested._\n");
    } else {
        output.push_str("## Balloons\n\n");
        let mut listed = 0;
        for index in context.tracked_indices() {
            let history = context.history(index);
            if history.len() < min_points {
                continue;
            }
            let Some(latest) = history.last() else {
                continue;
            };
            output.push_str(&format!(
                "- Balloon {index}: {} points, latest ({}) at {}\n",
                history.len(),
                latest.position,
                latest.timestamp
            ));
            listed += 1;
        }
        if listed == 0 {
            output.push_str(NO_POSITIONS_PLACEHOLDER);
            output.push('\n');
        }
    }

    render_warnings(
        &mut output,
        report
            .skipped
            .iter()
            .map(|skipped| format!("skipped {} ({}): {}", skipped.id, skipped.reason, skipped.detail)),
    );

    output
}

fn render_warnings(output: &mut String, warnings: impl Iterator<Item = String>) {
    let unique = warnings.collect::<BTreeSet<_>>();
    if unique.is_empty() {
        return;
    }

    output.push_str("\n## Warnings\n\n");
    for warning in unique {
        output.push_str(&format!("- {warning}\n"));
    }
}

/// Structured form of the selected tracks, or of every tracked balloon when
/// `selection` is `None`.
pub fn tracks_view(selection: Option<&Selection>, context: &IngestionContext) -> TracksView {
    if let Some(selection) = selection
        && selection.exceeds_limit()
    {
        return TracksView::TooManySelected {
            selected: selection.len(),
            limit: MAX_SELECTION,
        };
    }

    let indices = match selection {
        Some(selection) => selection.iter().collect::<Vec<_>>(),
        None => context.tracked_indices().collect(),
    };

    let tracks = indices
        .into_iter()
        .map(|index| TrackView {
            index,
            last_valid: context.last_valid(index).cloned(),
            entries: context
                .history(index)
                .iter()
                .map(|entry| TrackEntryView {
                    latitude: entry.position.latitude,
                    longitude: entry.position.longitude,
                    altitude: entry.position.altitude,
                    timestamp: entry.timestamp.to_string(),
                    snapshot: entry.timestamp.snapshot().clone(),
                    carried_from: entry.timestamp.carried_from().map(ToString::to_string),
                })
                .collect(),
        })
        .collect();

    TracksView::Tracks {
        expected_count: context.expected_count(),
        report: context.report().clone(),
        tracks,
    }
}

pub fn tracks_view_to_raw_json(view: &TracksView) -> Result<String> {
    let mut json = serde_json::to_string_pretty(view)
        .map_err(|err| BalloonError::Serialization(err.to_string()))?;
    json.push('\n');
    Ok(json)
}
