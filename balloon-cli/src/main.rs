use std::io;
use std::process::ExitCode;

use balloon_core::{
    AssistantConfig, Selection, SnapshotId, SourceConfig, SourceOverrides, Transcript,
    ask_about_selection, capture_snapshot, feed_location, load_tracks, render_overview_markdown,
    render_selection_transcript, tracks_to_raw_json,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "balloon",
    version,
    about = "Reconstruct balloon flight paths from periodic position snapshots"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Snapshot source: a directory or an http(s):// base URL serving index.json and <id>.json
    /// (overrides BALLOON_SOURCE)
    #[arg(long, global = true)]
    source: Option<String>,

    /// Number of most recent snapshots to process (overrides BALLOON_WINDOW)
    #[arg(long)]
    window: Option<usize>,

    /// Balloon indices to show, like 0,3,5-7 (at most 10)
    #[arg(long)]
    select: Option<String>,

    /// Output raw JSON instead of markdown
    #[arg(long)]
    raw: bool,

    /// Omit balloons with fewer points from the overview
    #[arg(long, default_value_t = 1)]
    min_points: usize,

    /// Ask the assistant a question about the selected balloons
    #[arg(long, requires = "select", conflicts_with = "raw")]
    ask: Option<String>,

    /// Log per-snapshot progress to stderr
    #[arg(long)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch the live feed once and store it in the snapshot directory
    Capture {
        /// Feed URL or local file (overrides BALLOON_FEED_URL)
        #[arg(long)]
        feed: Option<String>,

        /// Snapshot id to write instead of the current UTC minute (YYYYmmdd-HHMM)
        #[arg(long)]
        id: Option<SnapshotId>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> balloon_core::Result<()> {
    let overrides = SourceOverrides {
        source: cli.source.clone(),
        window: cli.window,
    };
    let config = SourceConfig::from_env_or_home(&overrides)?;

    if let Some(Command::Capture { feed, id }) = cli.command {
        let feed = feed_location(feed.as_deref());
        let captured = capture_snapshot(&config, &feed, id)?;
        println!(
            "captured {} ({} records) to {}",
            captured.id,
            captured.records,
            captured.path.display()
        );
        return Ok(());
    }

    let selection = cli.select.as_deref().map(Selection::parse).transpose()?;
    let context = load_tracks(&config)?;

    if let Some(question) = cli.ask.as_deref() {
        let selection = selection.unwrap_or_default();
        let transcript = render_selection_transcript(&selection, &context);
        if let Transcript::TooManySelected { .. } = transcript {
            print!("{transcript}");
            return Ok(());
        }

        let assistant = AssistantConfig::from_env()?;
        let answer = ask_about_selection(&assistant, &transcript, question)?;
        println!("{}", answer.trim_end());
        return Ok(());
    }

    if cli.raw {
        let raw_json = tracks_to_raw_json(selection.as_ref(), &context)?;
        print!("{raw_json}");
        return Ok(());
    }

    match selection {
        Some(selection) => print!("{}", render_selection_transcript(&selection, &context)),
        None => print!("{}", render_overview_markdown(&context, cli.min_points)),
    }

    Ok(())
}
