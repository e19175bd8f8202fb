//! Pulls the live position feed and files it into a snapshot directory, one
//! file per capture, named by the UTC minute it was taken.

use std::fs;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::error::{BalloonError, Result};
use crate::id::SnapshotId;
use crate::store::directory::CapturedSnapshot;
use crate::store::http::{build_client, get_text};
use crate::store::{DirectorySnapshotStore, SnapshotSource, SourceConfig};

pub const ENV_FEED_URL: &str = "BALLOON_FEED_URL";
pub const DEFAULT_FEED_URL: &str = "https://a.windbornesystems.com/treasure/00.json";

const SECONDS_PER_DAY: u64 = 86_400;

/// Resolves the feed location: the flag value, then `BALLOON_FEED_URL`, then
/// the public feed.
pub fn feed_location(flag: Option<&str>) -> String {
    feed_location_with(flag, |key| std::env::var(key).ok())
}

pub fn feed_location_with<F>(flag: Option<&str>, getter: F) -> String
where
    F: FnOnce(&str) -> Option<String>,
{
    flag.map(str::to_string)
        .or_else(|| getter(ENV_FEED_URL))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_FEED_URL.to_string())
}

/// Reads the feed from an http(s) URL or a local file.
pub fn fetch_feed(location: &str, timeout_ms: u64) -> Result<String> {
    if location.starts_with("http://") || location.starts_with("https://") {
        let client = build_client(location, timeout_ms)?;
        return get_text(&client, location).map_err(|reason| BalloonError::FeedFetch {
            location: location.to_string(),
            reason,
        });
    }

    let path = PathBuf::from(location);
    fs::read_to_string(&path).map_err(|source| BalloonError::Io { path, source })
}

/// Snapshot id for a capture taken at `time`, formatted `YYYYmmdd-HHMM` in UTC.
pub fn capture_id_at(time: SystemTime) -> Result<SnapshotId> {
    let seconds = time
        .duration_since(UNIX_EPOCH)
        .map_err(|_| BalloonError::InvalidSnapshotId("capture time precedes 1970".to_string()))?
        .as_secs();

    let (year, month, day) = civil_from_days(seconds / SECONDS_PER_DAY);
    let minute_of_day = seconds % SECONDS_PER_DAY / 60;
    SnapshotId::parse(&format!(
        "{year:04}{month:02}{day:02}-{:02}{:02}",
        minute_of_day / 60,
        minute_of_day % 60
    ))
}

/// Fetches the feed once and stores it in the configured directory.
pub fn capture_snapshot(
    config: &SourceConfig,
    feed: &str,
    id: Option<SnapshotId>,
) -> Result<CapturedSnapshot> {
    let SnapshotSource::Directory(root) = &config.source else {
        return Err(BalloonError::InvalidConfig {
            key: "--source",
            reason: "capture writes to a directory source, not a URL".to_string(),
        });
    };

    let id = match id {
        Some(id) => id,
        None => capture_id_at(SystemTime::now())?,
    };

    debug!(feed, id = %id, root = %root.display(), "capturing snapshot");
    let raw = fetch_feed(feed, config.http_timeout_ms)?;
    DirectorySnapshotStore::new(root).capture(&id, &raw)
}

// Gregorian date for a count of days since 1970-01-01.
fn civil_from_days(days: u64) -> (u64, u64, u64) {
    let shifted = days + 719_468;
    let era = shifted / 146_097;
    let day_of_era = shifted % 146_097;
    let year_of_era =
        (day_of_era - day_of_era / 1_460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    let month_index = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * month_index + 2) / 5 + 1;
    let month = if month_index < 10 {
        month_index + 3
    } else {
        month_index - 9
    };
    let year = year_of_era + era * 400 + u64::from(month <= 2);
    (year, month, day)
}
