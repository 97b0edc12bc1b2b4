use std::time::Duration;

use futures::StreamExt;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::USER_AGENT;
use crate::platforms::PlatformConfig;

/// Fixed pause before reopening a broken stream connection.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);
/// Reconnect attempts per stream session before giving up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

const STALL_TIMEOUT: Duration = Duration::from_secs(60);

/// Event decoded from one server-pushed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Progress(u8),
    Completed(String),
    Failed(String),
    Fallback(String),
}

/// What a [`StreamHandle`] delivers: wire events plus transport conditions the
/// client handles on its own (scheduled reconnects, exhaustion).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamMessage {
    Event(StreamEvent),
    /// Connection broke below 100%; a reopen is already scheduled.
    ConnectionLost { attempt: u32 },
    /// All reconnect attempts used up; the stream is dead.
    RetriesExhausted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    #[error("{0}")]
    ServerReported(String),
    #[error("Lost connection to the download server")]
    TransportBroken,
}

/// Decodes one payload by literal prefix. Unknown prefixes are ignored so the
/// server can add event kinds without breaking older clients; the same applies
/// to a progress payload whose remainder is not an integer.
pub fn parse_event(payload: &str) -> Option<StreamEvent> {
    if let Some(rest) = payload.strip_prefix("PROGRESS_") {
        let percent: u32 = rest.trim().parse().ok()?;
        return Some(StreamEvent::Progress(percent.min(100) as u8));
    }
    if let Some(rest) = payload.strip_prefix("DONE_") {
        return Some(StreamEvent::Completed(rest.to_string()));
    }
    if let Some(rest) = payload.strip_prefix("ERROR_") {
        return Some(StreamEvent::Failed(rest.to_string()));
    }
    if let Some(rest) = payload.strip_prefix("FALLBACK_") {
        return Some(StreamEvent::Fallback(rest.to_string()));
    }
    None
}

/// Incremental server-sent-events framing: splits on newlines and yields the
/// payload of `data:` lines. Field lines (`event:`, `id:`, `retry:`), comments
/// and blank separators are dropped. Bytes are buffered so a UTF-8 sequence or
/// line split across network chunks reassembles correctly.
#[derive(Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut payloads = Vec::new();

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.strip_prefix(' ').unwrap_or(data).to_string());
            }
        }
        payloads
    }
}

/// Receiving side of one progress stream. Dropping the handle closes the
/// connection.
pub struct StreamHandle {
    rx: mpsc::Receiver<StreamMessage>,
    cancel: CancellationToken,
}

impl StreamHandle {
    /// Next message, or `None` once the stream has ended or was closed.
    pub async fn next(&mut self) -> Option<StreamMessage> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            msg = self.rx.recv() => msg,
        }
    }

    /// Terminates the connection and any pending reconnect. Safe to call more
    /// than once; after the first call `next()` returns `None`.
    pub fn close(&self) {
        self.cancel.cancel();
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

pub struct ProgressStreamClient {
    client: reqwest::Client,
    reconnect_delay: Duration,
    max_reconnects: u32,
}

impl ProgressStreamClient {
    pub fn new() -> Self {
        // No overall request timeout: the stream stays open for the whole
        // download. Stalls are caught by STALL_TIMEOUT between chunks.
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self::with_client(client)
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            reconnect_delay: RECONNECT_DELAY,
            max_reconnects: MAX_RECONNECT_ATTEMPTS,
        }
    }

    pub fn with_retry_policy(mut self, delay: Duration, max_reconnects: u32) -> Self {
        self.reconnect_delay = delay;
        self.max_reconnects = max_reconnects;
        self
    }

    /// Opens the stream for a validated URL and returns the handle delivering
    /// its messages. The connection is driven by a background task that lives
    /// until a terminal event, retry exhaustion, or `close()`.
    pub fn open(&self, config: &PlatformConfig, video_url: &str) -> StreamHandle {
        let endpoint = config.stream_endpoint(video_url);
        let (tx, rx) = mpsc::channel(32);
        let cancel = CancellationToken::new();

        let worker = StreamWorker {
            client: self.client.clone(),
            endpoint,
            tx,
            cancel: cancel.clone(),
            reconnect_delay: self.reconnect_delay,
            max_reconnects: self.max_reconnects,
        };
        tokio::spawn(worker.run());

        StreamHandle { rx, cancel }
    }
}

impl Default for ProgressStreamClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Second step of the protocol: the stream only announces readiness, the
/// bytes come from the download endpoint keyed by the announced filename.
pub async fn fetch_completed_file(
    client: &reqwest::Client,
    config: &PlatformConfig,
    filename: &str,
) -> anyhow::Result<Vec<u8>> {
    let response = client.get(config.download_endpoint(filename)).send().await?;
    let status = response.status();
    if !status.is_success() {
        anyhow::bail!("HTTP {} fetching completed file", status);
    }
    Ok(response.bytes().await?.to_vec())
}

enum PumpOutcome {
    /// Terminal event delivered or receiver gone; worker is done.
    Terminal,
    Cancelled,
    TransportLost,
}

struct StreamWorker {
    client: reqwest::Client,
    endpoint: String,
    tx: mpsc::Sender<StreamMessage>,
    cancel: CancellationToken,
    reconnect_delay: Duration,
    max_reconnects: u32,
}

impl StreamWorker {
    async fn run(self) {
        // Highest percent seen across all connections of this session.
        let mut watermark: u8 = 0;
        let mut attempt: u32 = 0;

        loop {
            match self.pump_connection(&mut watermark).await {
                PumpOutcome::Terminal | PumpOutcome::Cancelled => return,
                PumpOutcome::TransportLost => {
                    if watermark >= 100 {
                        // Everything arrived before the break; presume complete.
                        tracing::debug!("[stream] transport closed at 100%, not reopening");
                        return;
                    }
                    attempt += 1;
                    if attempt > self.max_reconnects {
                        tracing::warn!(
                            "[stream] giving up after {} reconnect attempts",
                            self.max_reconnects
                        );
                        let _ = self.tx.send(StreamMessage::RetriesExhausted).await;
                        return;
                    }
                    tracing::warn!(
                        "[stream] connection lost at {}%, reopening in {:?} ({}/{})",
                        watermark,
                        self.reconnect_delay,
                        attempt,
                        self.max_reconnects
                    );
                    if self
                        .tx
                        .send(StreamMessage::ConnectionLost { attempt })
                        .await
                        .is_err()
                    {
                        return;
                    }
                    tokio::select! {
                        _ = self.cancel.cancelled() => return,
                        _ = tokio::time::sleep(self.reconnect_delay) => {}
                    }
                }
            }
        }
    }

    async fn pump_connection(&self, watermark: &mut u8) -> PumpOutcome {
        let request = self
            .client
            .get(&self.endpoint)
            .header("Accept", "text/event-stream");

        let response = tokio::select! {
            _ = self.cancel.cancelled() => return PumpOutcome::Cancelled,
            r = request.send() => r,
        };
        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                tracing::warn!("[stream] HTTP {} from stream endpoint", r.status());
                return PumpOutcome::TransportLost;
            }
            Err(e) => {
                tracing::warn!("[stream] connect failed: {}", e);
                return PumpOutcome::TransportLost;
            }
        };

        let mut decoder = SseDecoder::default();
        let mut stream = response.bytes_stream();
        // Progress may not regress within a single connection; a reopened
        // connection is allowed to restart lower.
        let mut floor: u8 = 0;

        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => return PumpOutcome::Cancelled,
                n = tokio::time::timeout(STALL_TIMEOUT, stream.next()) => n,
            };

            let bytes = match next {
                Ok(Some(Ok(bytes))) => bytes,
                Ok(Some(Err(e))) => {
                    tracing::warn!("[stream] read error: {}", e);
                    return PumpOutcome::TransportLost;
                }
                // Server closed without a terminal event.
                Ok(None) => return PumpOutcome::TransportLost,
                Err(_) => {
                    tracing::warn!(
                        "[stream] no data for {:?}, treating as lost",
                        STALL_TIMEOUT
                    );
                    return PumpOutcome::TransportLost;
                }
            };

            for payload in decoder.feed(&bytes) {
                let Some(event) = parse_event(&payload) else {
                    continue;
                };
                match event {
                    StreamEvent::Progress(n) => {
                        if n < floor {
                            tracing::debug!("[stream] dropping regressed progress {}%", n);
                            continue;
                        }
                        floor = n;
                        *watermark = (*watermark).max(n);
                        if self
                            .tx
                            .send(StreamMessage::Event(StreamEvent::Progress(n)))
                            .await
                            .is_err()
                        {
                            return PumpOutcome::Terminal;
                        }
                    }
                    StreamEvent::Completed(file) => {
                        *watermark = 100;
                        let _ = self
                            .tx
                            .send(StreamMessage::Event(StreamEvent::Completed(file)))
                            .await;
                        return PumpOutcome::Terminal;
                    }
                    StreamEvent::Failed(msg) => {
                        let _ = self
                            .tx
                            .send(StreamMessage::Event(StreamEvent::Failed(msg)))
                            .await;
                        return PumpOutcome::Terminal;
                    }
                    StreamEvent::Fallback(url) => {
                        let _ = self
                            .tx
                            .send(StreamMessage::Event(StreamEvent::Fallback(url)))
                            .await;
                        return PumpOutcome::Terminal;
                    }
                }
            }
        }
    }
}
