//! Hall-of-fame page rendering and best-effort publication.
//!
//! Publication is a cache of the aggregate statistics: it runs with a bounded timeout and
//! every failure is logged and dropped.

use std::fmt::Debug;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use derive_more::{Display, Error};
use tracing::{debug, info, instrument, warn};

use crate::scoring::{LeaderboardEntry, rank_leaderboard};

/// Default destination key of the hall-of-fame page.
pub const HOF_KEY: &str = "hall-of-fame.html";

const HOF_TEMPLATE: &str = include_str!("../templates/hall-of-fame.html");
const HOF_PLACEHOLDER: &str = "{{ hof-table }}";

/// Publication error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Publish error: {} at {}:{}", message, file, line)]
pub struct PublishError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl PublishError {
    /// Creates a new publication error.
    #[track_caller]
    pub fn new(message: impl Into<String>) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message: message.into(),
            line: loc.line(),
            file: loc.file(),
        }
    }
}

/// Destination for static pages.
#[async_trait]
pub trait PublicationSink: Debug + Send + Sync {
    /// Stores `html` under `destination_key`.
    async fn publish(&self, html: &str, destination_key: &str) -> Result<(), PublishError>;
}

/// Writes pages into a local directory.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    /// Creates a sink rooted at `dir`; the directory is created on first publish.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl PublicationSink for DirectorySink {
    #[instrument(skip(self, html), fields(dir = %self.dir.display()))]
    async fn publish(&self, html: &str, destination_key: &str) -> Result<(), PublishError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| PublishError::new(format!("Failed to create {}: {}", self.dir.display(), e)))?;
        let path = self.dir.join(destination_key);
        tokio::fs::write(&path, html)
            .await
            .map_err(|e| PublishError::new(format!("Failed to write {}: {}", path.display(), e)))?;
        debug!(path = %path.display(), bytes = html.len(), "Page written");
        Ok(())
    }
}

/// Uploads pages with HTTP `PUT` to `{base_url}/{destination_key}`.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSink {
    /// Creates a sink that uploads under `base_url`.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PublicationSink for HttpSink {
    #[instrument(skip(self, html), fields(base_url = %self.base_url))]
    async fn publish(&self, html: &str, destination_key: &str) -> Result<(), PublishError> {
        let url = format!("{}/{}", self.base_url.trim_end_matches('/'), destination_key);
        let response = self
            .client
            .put(&url)
            .header("content-type", "text/html")
            .body(html.to_string())
            .send()
            .await
            .map_err(|e| PublishError::new(format!("Upload to {} failed: {}", url, e)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::new(format!("Upload to {} returned {}", url, status)));
        }
        debug!(%url, "Page uploaded");
        Ok(())
    }
}

/// Outcome of one publication attempt. Callers log it and move on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishStatus {
    /// The sink accepted the page.
    Published,
    /// The sink reported an error.
    Failed(String),
    /// The sink did not answer within the timeout.
    TimedOut,
}

/// Renders the hall-of-fame page, best average first.
#[instrument(skip(entries), fields(entries = entries.len()))]
pub fn render_hall_of_fame(entries: &[LeaderboardEntry]) -> String {
    let rows = rank_leaderboard(entries.to_vec())
        .iter()
        .map(|e| {
            format!(
                "<tr><td>{}</td><td>{:.2}</td></tr>",
                escape_html(&e.user_id),
                e.average_score
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    HOF_TEMPLATE.replace(HOF_PLACEHOLDER, &rows)
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Publishes the hall of fame through an injected sink.
#[derive(Debug, Clone)]
pub struct HallOfFame {
    sink: Arc<dyn PublicationSink>,
    destination_key: String,
    timeout: Duration,
}

impl HallOfFame {
    /// Creates a publisher over `sink`.
    pub fn new(sink: Arc<dyn PublicationSink>, destination_key: String, timeout: Duration) -> Self {
        Self {
            sink,
            destination_key,
            timeout,
        }
    }

    /// Renders and publishes the page, waiting at most the configured timeout.
    #[instrument(skip(self, entries), fields(key = %self.destination_key))]
    pub async fn publish(&self, entries: &[LeaderboardEntry]) -> PublishStatus {
        let html = render_hall_of_fame(entries);
        match tokio::time::timeout(self.timeout, self.sink.publish(&html, &self.destination_key))
            .await
        {
            Ok(Ok(())) => {
                info!("Hall of fame published");
                PublishStatus::Published
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Hall of fame publication failed");
                PublishStatus::Failed(e.message)
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "Hall of fame publication timed out");
                PublishStatus::TimedOut
            }
        }
    }
}
