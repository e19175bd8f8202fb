pub mod assistant;
pub mod capture;
pub mod error;
pub mod id;
pub mod model;
pub mod parser;
pub mod reconstruct;
pub mod render;
pub mod selection;
pub mod service;
pub mod store;

pub use assistant::{AssistantConfig, CompletionClient, OpenAiChatClient};
pub use capture::{capture_snapshot, feed_location};
pub use error::{BalloonError, Result};
pub use id::SnapshotId;
pub use model::{
    EntryTimestamp, HistoryEntry, IngestReport, LastValid, Position, Record, SkipReason,
    SkippedSnapshot, TracksView,
};
pub use reconstruct::{IngestionContext, ingest};
pub use render::Transcript;
pub use selection::{MAX_SELECTION, Selection};
pub use service::{
    ask_about_selection, load_tracks, render_overview_markdown, render_selection_transcript,
    tracks_to_raw_json,
};
pub use store::{
    CapturedSnapshot, DirectorySnapshotStore, HttpSnapshotStore, MemorySnapshotStore,
    SnapshotSource, SnapshotStore, SourceConfig, SourceOverrides,
};
