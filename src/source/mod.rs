// Poll sources: where raw snapshots come from

use crate::config::{SourceConfig, SourceKind};
use crate::poll::PollPayload;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;


/// Source of raw poll payloads.
///
/// Implementations are stateless from the engine's point of view: each
/// `fetch` returns one complete payload or an error, never a partial one.
#[async_trait]
pub trait PollSource: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<PollPayload>;
}

/// Polls a JSON snapshot endpoint over HTTP
pub struct HttpPollSource {
    url: String,
    http_client: reqwest::Client,
}

impl HttpPollSource {
    pub fn new(url: &str, timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            url: url.to_string(),
            http_client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl PollSource for HttpPollSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch(&self) -> Result<PollPayload> {
        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.url))?
            .error_for_status()
            .context("Snapshot endpoint returned an error status")?;

        response
            .json::<PollPayload>()
            .await
            .context("Failed to parse snapshot payload")
    }
}

/// Reads the snapshot from a JSON file on every poll
pub struct FilePollSource {
    path: PathBuf,
}

impl FilePollSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PollSource for FilePollSource {
    fn name(&self) -> &str {
        "file"
    }

    async fn fetch(&self) -> Result<PollPayload> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read snapshot file {}", self.path.display()))?;

        serde_json::from_str(&contents).context("Failed to parse snapshot payload")
    }
}

/// Build the configured poll source
pub fn from_config(config: &SourceConfig) -> Result<Arc<dyn PollSource>> {
    match config.kind {
        SourceKind::Http => {
            info!(url = %config.url, timeout_ms = config.timeout_ms, "Using HTTP poll source");
            Ok(Arc::new(HttpPollSource::new(&config.url, config.timeout())?))
        }
        SourceKind::File => {
            let path = config
                .path
                .as_ref()
                .ok_or_else(|| anyhow!("source.path is required for kind = \"file\""))?;
            info!(path = %path.display(), "Using file poll source");
            Ok(Arc::new(FilePollSource::new(path.clone())))
        }
    }
}
