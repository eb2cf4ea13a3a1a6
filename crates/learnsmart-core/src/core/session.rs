//! One streamed response, from request to final render.
//!
//! The session drives the loop `next_chunk -> append -> render -> replace`
//! strictly in order and owns the lifecycle state of the request.

use std::fmt;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::surface::DisplaySurface;
use crate::backend::{ByteStream, TransportError, TransportResult};
use crate::render::{RenderPipeline, RenderPolicy};
use crate::stream::{StreamConsumer, StreamItem};

/// Lifecycle of one prompt request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestState {
    #[default]
    Idle,
    Streaming,
    Completed,
    Failed,
    Canceled,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Canceled)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Canceled => "canceled",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Accumulated decoded text of one response. Only grows while streaming.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseBuffer {
    text: String,
}

impl ResponseBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &str) {
        self.text.push_str(fragment);
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn truncate(&mut self, len: usize) {
        self.text.truncate(len);
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

/// What a finished session leaves behind.
#[derive(Debug, Clone)]
pub struct StreamOutcome {
    pub request_id: Uuid,
    pub state: RequestState,
    /// Raw decoded text, including partial output of a failed request.
    pub buffer: String,
    /// Last HTML handed to the surface (empty if nothing was rendered).
    pub html: String,
    pub error: Option<TransportError>,
    /// Fragments appended to the buffer.
    pub chunks: usize,
}

/// Drives a single request against a display surface.
pub struct StreamSession {
    id: Uuid,
    pipeline: RenderPipeline,
    state: watch::Sender<RequestState>,
}

impl StreamSession {
    pub fn new(policy: RenderPolicy) -> Self {
        let (state, _) = watch::channel(RequestState::Idle);
        Self::with_state(policy, state)
    }

    /// Creates a session that publishes its state on an existing channel.
    pub fn with_state(policy: RenderPolicy, state: watch::Sender<RequestState>) -> Self {
        Self {
            id: Uuid::new_v4(),
            pipeline: RenderPipeline::new(policy),
            state,
        }
    }

    pub fn request_id(&self) -> Uuid {
        self.id
    }

    pub fn subscribe(&self) -> watch::Receiver<RequestState> {
        self.state.subscribe()
    }

    /// Streams an already opened response body into `surface`.
    pub async fn run<S>(
        self,
        stream: ByteStream,
        cancel: CancellationToken,
        surface: &mut S,
    ) -> StreamOutcome
    where
        S: DisplaySurface + ?Sized,
    {
        self.run_with(async move { Ok(stream) }, cancel, surface).await
    }

    /// Opens the response with `open`, then streams it into `surface`.
    ///
    /// Cancellation is honored while the request is being opened too.
    pub async fn run_with<F, S>(
        mut self,
        open: F,
        cancel: CancellationToken,
        surface: &mut S,
    ) -> StreamOutcome
    where
        F: Future<Output = TransportResult<ByteStream>>,
        S: DisplaySurface + ?Sized,
    {
        let span = tracing::info_span!("stream", request_id = %self.id);
        async move {
            self.pipeline.reset();
            let mut drive = Drive::default();
            self.set_state(RequestState::Streaming);
            surface.replace("");
            tracing::info!(policy = self.pipeline.policy().id(), "request started");

            let opened = tokio::select! {
                biased;
                () = cancel.cancelled() => None,
                opened = open => Some(opened),
            };
            let outcome = match opened {
                None => self.canceled(drive),
                Some(Err(err)) => self.failed(drive, err, &mut *surface),
                Some(Ok(stream)) => {
                    let mut consumer = StreamConsumer::new(stream, cancel.clone());
                    loop {
                        match consumer.next_chunk().await {
                            Ok(StreamItem::Chunk(text)) => {
                                if !self.apply_fragment(&mut drive, &text, &cancel, &mut *surface) {
                                    break self.canceled(drive);
                                }
                            }
                            Ok(StreamItem::End) => break self.completed(drive, &mut *surface),
                            Ok(StreamItem::Canceled) => break self.canceled(drive),
                            Err(err) => break self.failed(drive, err, &mut *surface),
                        }
                    }
                }
            };

            tracing::info!(
                state = %outcome.state,
                chunks = outcome.chunks,
                bytes = outcome.buffer.len(),
                "request finished"
            );
            outcome
        }
        .instrument(span)
        .await
    }

    /// Appends, renders and displays one fragment.
    ///
    /// Returns false when the token fired; the fragment is then dropped and
    /// the surface is left as it was.
    fn apply_fragment<S>(
        &mut self,
        drive: &mut Drive,
        text: &str,
        cancel: &CancellationToken,
        surface: &mut S,
    ) -> bool
    where
        S: DisplaySurface + ?Sized,
    {
        if cancel.is_cancelled() {
            return false;
        }

        let previous_len = drive.buffer.len();
        drive.buffer.push(text);
        let html = self.pipeline.render(drive.buffer.as_str());

        if cancel.is_cancelled() {
            drive.buffer.truncate(previous_len);
            return false;
        }

        surface.replace(&html);
        drive.html = html;
        drive.chunks += 1;
        tracing::debug!(
            chunk = drive.chunks,
            fragment_len = text.len(),
            buffer_len = drive.buffer.len(),
            "rendered fragment"
        );
        true
    }

    fn completed<S>(&mut self, mut drive: Drive, surface: &mut S) -> StreamOutcome
    where
        S: DisplaySurface + ?Sized,
    {
        let html = self.pipeline.render(drive.buffer.as_str());
        surface.replace(&html);
        drive.html = html;
        self.finish(drive, RequestState::Completed, None)
    }

    fn failed<S>(&mut self, mut drive: Drive, err: TransportError, surface: &mut S) -> StreamOutcome
    where
        S: DisplaySurface + ?Sized,
    {
        tracing::warn!(error = %err, kind = ?err.kind, "stream failed");
        let notice = self.pipeline.sanitize(&error_notice(&err));
        drive.html.push_str(&notice);
        surface.replace(&drive.html);
        self.finish(drive, RequestState::Failed, Some(err))
    }

    fn canceled(&mut self, drive: Drive) -> StreamOutcome {
        tracing::info!("request canceled");
        self.finish(drive, RequestState::Canceled, None)
    }

    fn finish(
        &mut self,
        drive: Drive,
        state: RequestState,
        error: Option<TransportError>,
    ) -> StreamOutcome {
        self.set_state(state);
        StreamOutcome {
            request_id: self.id,
            state,
            buffer: drive.buffer.into_string(),
            html: drive.html,
            error,
            chunks: drive.chunks,
        }
    }

    fn set_state(&self, state: RequestState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            tracing::debug!(from = %previous, to = %state, "state changed");
        }
    }
}

impl fmt::Debug for StreamSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamSession")
            .field("id", &self.id)
            .field("policy", &self.pipeline.policy())
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Default)]
struct Drive {
    buffer: ResponseBuffer,
    html: String,
    chunks: usize,
}

/// Markup appended below partial output when a request fails.
fn error_notice(err: &TransportError) -> String {
    format!(
        "<div class=\"learnsmart-error\" role=\"alert\">Response incomplete: {}</div>",
        ammonia::clean_text(&err.message)
    )
}
