use std::time::Duration;

use reqwest::blocking::Client;

use crate::error::{BalloonError, Result};
use crate::id::SnapshotId;
use crate::store::{INDEX_FILE_NAME, SnapshotStore, parse_index};

/// Snapshots served as `<base_url>/<id>.json`, listed by
/// `<base_url>/index.json`.
#[derive(Debug, Clone)]
pub struct HttpSnapshotStore {
    base_url: String,
    client: Client,
}

impl HttpSnapshotStore {
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let client = build_client(&base_url, timeout_ms)?;
        Ok(Self { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, file_name: &str) -> String {
        format!("{}/{file_name}", self.base_url)
    }
}

pub(crate) fn build_client(url: &str, timeout_ms: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_millis(timeout_ms.max(1)))
        .build()
        .map_err(|source| BalloonError::Http {
            url: url.to_string(),
            source,
        })
}

/// GETs `url`, treating any non-2xx status as a failure.
pub(crate) fn get_text(client: &Client, url: &str) -> std::result::Result<String, String> {
    let response = client.get(url).send().map_err(|err| err.to_string())?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("http status {}", status.as_u16()));
    }

    response.text().map_err(|err| err.to_string())
}

impl SnapshotStore for HttpSnapshotStore {
    fn describe(&self) -> String {
        self.base_url.clone()
    }

    fn list_snapshots(&self) -> Result<Vec<String>> {
        let url = self.url_for(INDEX_FILE_NAME);
        let text = get_text(&self.client, &url)
            .map_err(|reason| BalloonError::IndexFetch {
                source_name: url.clone(),
                reason,
            })?;
        parse_index(&url, &text)
    }

    fn fetch_snapshot(&self, id: &SnapshotId) -> Result<String> {
        let url = self.url_for(&id.file_name());
        get_text(&self.client, &url)
            .map_err(|reason| BalloonError::SnapshotFetch {
                id: id.to_string(),
                reason: format!("{url}: {reason}"),
            })
    }
}
