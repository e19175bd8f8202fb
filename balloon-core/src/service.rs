use crate::assistant::{self, AssistantConfig, OpenAiChatClient};
use crate::error::Result;
use crate::model::TracksView;
use crate::reconstruct::{self, IngestionContext};
use crate::render::{self, Transcript};
use crate::selection::Selection;
use crate::store::SourceConfig;

/// Opens the configured source and runs one ingestion over its most recent
/// window.
pub fn load_tracks(config: &SourceConfig) -> Result<IngestionContext> {
    let store = config.open_store()?;
    reconstruct::ingest(store.as_ref(), config.window)
}

pub fn render_overview_markdown(context: &IngestionContext, min_points: usize) -> String {
    render::render_overview(context, min_points)
}

pub fn render_selection_transcript(
    selection: &Selection,
    context: &IngestionContext,
) -> Transcript {
    render::render_transcript(selection, context)
}

pub fn tracks_to_raw_json(
    selection: Option<&Selection>,
    context: &IngestionContext,
) -> Result<String> {
    let view: TracksView = render::tracks_view(selection, context);
    render::tracks_view_to_raw_json(&view)
}

/// Asks the configured assistant about an already rendered transcript.
pub fn ask_about_selection(
    config: &AssistantConfig,
    transcript: &Transcript,
    question: &str,
) -> Result<String> {
    let client = OpenAiChatClient::from_config(config)?;
    assistant::ask(&client, &config.model, transcript, question)
}
