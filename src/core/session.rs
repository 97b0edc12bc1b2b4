use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;

use crate::core::clipboard::ClipboardReader;
use crate::core::preview::PreviewFetcher;
use crate::core::saver::{FileSaver, LinkOpener};
use crate::core::stream::{
    self, ProgressStreamClient, StreamError, StreamEvent, StreamMessage,
};
use crate::core::{validate, USER_AGENT};
use crate::models::media::PreviewMedia;
use crate::platforms::{Platform, PlatformConfig};
use crate::storage::history::{HistoryEntry, HistoryStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Previewing,
    Previewed,
    Downloading,
    Done,
    Failed,
}

/// One user interaction cycle with a platform panel: paste, preview,
/// download. All fields are mutated exclusively by [`SessionController`].
#[derive(Debug, Clone)]
pub struct Session {
    pub platform: Platform,
    pub raw_input: String,
    pub state: SessionState,
    pub preview: Option<PreviewMedia>,
    pub progress_percent: u8,
    pub last_error: Option<String>,
    /// Set when the server handed the download off to an external link.
    pub fallback_url: Option<String>,
    /// Automatic reconnects used by the current stream; reset by user action.
    pub retry_count: u32,
}

impl Session {
    fn new(platform: Platform) -> Self {
        Self {
            platform,
            raw_input: String::new(),
            state: SessionState::Idle,
            preview: None,
            progress_percent: 0,
            last_error: None,
            fallback_url: None,
            retry_count: 0,
        }
    }
}

/// User-input problems reported back to the caller directly; these never
/// reach the backend and never change session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("Please enter a valid {0} video URL!")]
    InvalidUrl(&'static str),
    #[error("Preview the video before downloading!")]
    NotPreviewed,
    #[error("Unable to read the clipboard!")]
    ClipboardUnavailable,
}

enum StreamFlow {
    Continue,
    Finished,
    SaveFile(String),
    OpenFallback(String),
}

/// Drives one session through the preview and download flow and owns every
/// state transition. Capabilities with host-specific behavior (file saving,
/// history, link opening) are injected.
pub struct SessionController {
    config: PlatformConfig,
    session: Session,
    fetcher: PreviewFetcher,
    stream_client: ProgressStreamClient,
    file_client: reqwest::Client,
    history: Arc<dyn HistoryStore>,
    saver: Arc<dyn FileSaver>,
    opener: Arc<dyn LinkOpener>,
    preview_seq: u64,
}

impl SessionController {
    pub fn new(
        config: PlatformConfig,
        history: Arc<dyn HistoryStore>,
        saver: Arc<dyn FileSaver>,
        opener: Arc<dyn LinkOpener>,
    ) -> Self {
        let file_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(120))
            .build()
            .unwrap_or_default();

        Self {
            session: Session::new(config.platform),
            config,
            fetcher: PreviewFetcher::new(),
            stream_client: ProgressStreamClient::new(),
            file_client,
            history,
            saver,
            opener,
            preview_seq: 0,
        }
    }

    pub fn with_fetcher(mut self, fetcher: PreviewFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn with_stream_client(mut self, client: ProgressStreamClient) -> Self {
        self.stream_client = client;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn validate_input(&self) -> bool {
        validate::validate(self.session.platform, &self.session.raw_input)
    }

    /// Replaces the pasted link. Any previous preview, progress or error
    /// belongs to the old input and is dropped; in-flight preview results are
    /// invalidated.
    pub fn set_input(&mut self, raw_input: impl Into<String>) {
        self.preview_seq += 1;
        self.session.raw_input = raw_input.into();
        self.session.preview = None;
        self.session.progress_percent = 0;
        self.session.last_error = None;
        self.session.fallback_url = None;
        self.session.state = SessionState::Idle;
    }

    /// Validates the input and resolves it to playable media. Backend
    /// failures land in the session state (`Failed`), not in the return
    /// value; only input problems are returned.
    pub async fn request_preview(&mut self) -> Result<(), RequestError> {
        if !self.validate_input() {
            return Err(RequestError::InvalidUrl(self.session.platform.display_name()));
        }

        self.preview_seq += 1;
        let token = self.preview_seq;
        self.session.state = SessionState::Previewing;
        self.session.preview = None;
        self.session.last_error = None;

        let url = self.session.raw_input.trim().to_string();
        let result = self.fetcher.fetch(&self.config, &url).await;

        if token != self.preview_seq {
            // A newer preview or input edit superseded this call.
            tracing::debug!("[session] discarding stale preview result");
            return Ok(());
        }

        match result {
            Ok(media) => {
                self.session.preview = Some(media);
                self.session.state = SessionState::Previewed;
            }
            Err(e) => {
                tracing::warn!("[session] preview failed: {}", e);
                self.session.last_error = Some(e.to_string());
                self.session.state = SessionState::Failed;
            }
        }
        Ok(())
    }

    /// Reads a link from the clipboard and previews it in one step.
    pub async fn preview_from_clipboard(
        &mut self,
        reader: &dyn ClipboardReader,
    ) -> Result<(), RequestError> {
        let text = match reader.read_text().await {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("[session] clipboard read failed: {}", e);
                return Err(RequestError::ClipboardUnavailable);
            }
        };
        self.set_input(text.trim().to_string());
        self.request_preview().await
    }

    /// Opens the progress stream for the previewed video and drives it to a
    /// terminal state: saves the finished file on `DONE`, opens the external
    /// link on `FALLBACK`, records the server message on `ERROR`. Transport
    /// breaks below 100% are ridden out by the stream client's reconnects.
    pub async fn request_download(&mut self) -> Result<&Session, RequestError> {
        if self.session.state != SessionState::Previewed || self.session.preview.is_none() {
            return Err(RequestError::NotPreviewed);
        }
        if !self.validate_input() {
            return Err(RequestError::InvalidUrl(self.session.platform.display_name()));
        }

        self.session.state = SessionState::Downloading;
        self.session.progress_percent = 0;
        self.session.last_error = None;
        self.session.fallback_url = None;
        self.session.retry_count = 0;

        let url = self.session.raw_input.trim().to_string();
        let mut handle = self.stream_client.open(&self.config, &url);

        while let Some(msg) = handle.next().await {
            match self.on_stream_message(msg) {
                StreamFlow::Continue => {}
                StreamFlow::Finished => {
                    handle.close();
                    break;
                }
                StreamFlow::SaveFile(file_id) => {
                    handle.close();
                    self.finish_download(&file_id).await;
                    break;
                }
                StreamFlow::OpenFallback(fallback) => {
                    handle.close();
                    self.finish_fallback(&fallback);
                    break;
                }
            }
        }

        // The stream went away without a terminal event (connection closed
        // for good). The file never arrived, whatever the last percent said.
        if self.session.state == SessionState::Downloading {
            self.session.last_error = Some(StreamError::TransportBroken.to_string());
            self.session.state = SessionState::Failed;
        }

        Ok(&self.session)
    }

    /// Back to a blank panel, keeping the platform. Clears input, preview,
    /// progress and errors; any in-flight work is invalidated.
    pub fn reset(&mut self) {
        self.preview_seq += 1;
        self.session = Session::new(self.session.platform);
    }

    fn on_stream_message(&mut self, msg: StreamMessage) -> StreamFlow {
        match msg {
            StreamMessage::Event(StreamEvent::Progress(percent)) => {
                self.session.progress_percent = percent;
                StreamFlow::Continue
            }
            StreamMessage::Event(StreamEvent::Completed(file_id)) => {
                self.session.progress_percent = 100;
                StreamFlow::SaveFile(file_id)
            }
            StreamMessage::Event(StreamEvent::Failed(message)) => {
                self.session.last_error = Some(message);
                self.session.state = SessionState::Failed;
                StreamFlow::Finished
            }
            StreamMessage::Event(StreamEvent::Fallback(url)) => StreamFlow::OpenFallback(url),
            StreamMessage::ConnectionLost { attempt } => {
                // Transient; surfaced through retry_count while the stream
                // client reopens on its own.
                self.session.retry_count = attempt;
                tracing::warn!("[session] lost server connection, retrying ({})", attempt);
                StreamFlow::Continue
            }
            StreamMessage::RetriesExhausted => {
                self.session.last_error = Some(StreamError::TransportBroken.to_string());
                self.session.state = SessionState::Failed;
                StreamFlow::Finished
            }
        }
    }

    async fn finish_download(&mut self, file_id: &str) {
        let bytes =
            match stream::fetch_completed_file(&self.file_client, &self.config, file_id).await {
                Ok(b) => b,
                Err(e) => {
                    tracing::warn!("[session] file retrieval failed: {}", e);
                    self.session.last_error = Some(format!("Could not fetch the finished file: {}", e));
                    self.session.state = SessionState::Failed;
                    return;
                }
            };

        match self.saver.save(file_id, &bytes).await {
            Ok(path) => {
                tracing::info!("[session] download saved to {}", path.display());
                self.session.state = SessionState::Done;
                self.record_history().await;
            }
            Err(e) => {
                tracing::warn!("[session] save failed: {}", e);
                self.session.last_error = Some(format!("Could not save the file: {}", e));
                self.session.state = SessionState::Failed;
            }
        }
    }

    fn finish_fallback(&mut self, url: &str) {
        if let Err(e) = self.opener.open(url) {
            tracing::warn!("[session] could not open fallback link: {}", e);
        }
        self.session.fallback_url = Some(url.to_string());
        self.session.state = SessionState::Done;
    }

    /// History is cosmetic; a failed write never demotes a finished download.
    async fn record_history(&self) {
        let Some(preview) = &self.session.preview else {
            return;
        };
        let entry = HistoryEntry {
            platform: self.session.platform,
            url: self.session.raw_input.trim().to_string(),
            title: preview.title.clone(),
            media_url: preview.media_url.clone(),
            timestamp: Utc::now(),
        };
        if let Err(e) = self.history.append(entry).await {
            tracing::warn!("[session] could not record history: {}", e);
        }
    }
}
