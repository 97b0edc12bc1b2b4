use std::time::Duration;

use thiserror::Error;

use crate::core::USER_AGENT;
use crate::models::media::{PreviewMedia, PreviewResponse};
use crate::platforms::PlatformConfig;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreviewError {
    /// Backend answered but produced no playable media URL. Carries the
    /// server's own error text when it sent one.
    #[error("{}", .0.as_deref().unwrap_or("No video found for this link"))]
    NoMedia(Option<String>),
    /// The resolved media URL did not answer the liveness probe.
    #[error("Video URL is not available")]
    MediaUnavailable,
    #[error("Network error: {0}")]
    Transport(String),
}

/// Resolves a pasted link to playable media via the backend preview endpoint.
/// Does not touch session state; the controller applies the result.
pub struct PreviewFetcher {
    client: reqwest::Client,
    probe_media: bool,
}

impl PreviewFetcher {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self::with_client(client)
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            probe_media: true,
        }
    }

    /// Disables the HEAD probe of the resolved media URL. Some platforms'
    /// CDNs reject HEAD, and tests have no CDN at all.
    pub fn with_probe(mut self, probe_media: bool) -> Self {
        self.probe_media = probe_media;
        self
    }

    pub async fn fetch(
        &self,
        config: &PlatformConfig,
        video_url: &str,
    ) -> Result<PreviewMedia, PreviewError> {
        let response = self
            .client
            .post(config.preview_endpoint())
            .json(&serde_json::json!({ "url": video_url }))
            .send()
            .await
            .map_err(|e| PreviewError::Transport(e.to_string()))?;

        let status = response.status();
        // Error responses still carry a JSON body with an `error` field;
        // anything unparseable degrades to the empty payload.
        let payload: PreviewResponse = response.json().await.unwrap_or_default();

        let media_url = match payload.video_url {
            Some(u) if !u.is_empty() && status.is_success() => u,
            _ => return Err(PreviewError::NoMedia(payload.error)),
        };

        if self.probe_media {
            let probe = self
                .client
                .head(&media_url)
                .send()
                .await
                .map_err(|_| PreviewError::MediaUnavailable)?;
            if !probe.status().is_success() {
                return Err(PreviewError::MediaUnavailable);
            }
        }

        Ok(PreviewMedia {
            media_url,
            title: payload.title.unwrap_or_else(|| "Untitled".to_string()),
            thumbnail_url: payload.thumbnail,
        })
    }
}

impl Default for PreviewFetcher {
    fn default() -> Self {
        Self::new()
    }
}
