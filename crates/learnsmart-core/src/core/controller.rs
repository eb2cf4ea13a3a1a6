//! Prompt controller: one active request per display surface.
//!
//! Submitting a new prompt cancels the active request and waits for its task
//! to hand the surface back before the next request starts, so the surface
//! only ever has one writer.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::session::{RequestState, StreamOutcome, StreamSession};
use super::surface::DisplaySurface;
use crate::backend::{BackendClient, ByteStream, TransportResult};
use crate::render::RenderPolicy;

/// Opens the response body for a prompt.
pub trait PromptSource: Send + Sync + 'static {
    fn open(&self, prompt: String) -> BoxFuture<'static, TransportResult<ByteStream>>;
}

impl PromptSource for BackendClient {
    fn open(&self, prompt: String) -> BoxFuture<'static, TransportResult<ByteStream>> {
        let client = self.clone();
        async move { client.send_prompt(&prompt).await }.boxed()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControllerOptions {
    pub policy: RenderPolicy,
    /// Cancels a request that is still streaming after this long.
    pub deadline: Option<Duration>,
}

struct ActiveRequest<S> {
    cancel: CancellationToken,
    handle: JoinHandle<(S, StreamOutcome)>,
}

/// Owns a display surface and the request currently writing to it.
pub struct PromptController<S> {
    source: Arc<dyn PromptSource>,
    options: ControllerOptions,
    state: watch::Sender<RequestState>,
    root: CancellationToken,
    surface: Option<S>,
    active: Option<ActiveRequest<S>>,
}

impl<S> PromptController<S>
where
    S: DisplaySurface + Send + 'static,
{
    pub fn new(source: Arc<dyn PromptSource>, surface: S, options: ControllerOptions) -> Self {
        let (state, _) = watch::channel(RequestState::Idle);
        Self {
            source,
            options,
            state,
            root: CancellationToken::new(),
            surface: Some(surface),
            active: None,
        }
    }

    /// Subscribes to lifecycle state changes.
    pub fn state(&self) -> watch::Receiver<RequestState> {
        self.state.subscribe()
    }

    pub fn current_state(&self) -> RequestState {
        *self.state.borrow()
    }

    /// True while a request task holds the surface.
    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    /// The surface, when no request is holding it.
    pub fn surface(&self) -> Option<&S> {
        self.surface.as_ref()
    }

    pub fn surface_mut(&mut self) -> Option<&mut S> {
        self.surface.as_mut()
    }

    /// Starts streaming `prompt`, canceling any request already in flight.
    ///
    /// Returns the outcome of the request that was replaced, if any.
    ///
    /// # Errors
    /// Returns an error if the previous request task panicked and took the
    /// surface with it.
    pub async fn submit(&mut self, prompt: impl Into<String>) -> Result<Option<StreamOutcome>> {
        let previous = if let Some(active) = self.active.as_ref() {
            active.cancel.cancel();
            self.finish().await?
        } else {
            None
        };

        let mut surface = self
            .surface
            .take()
            .context("display surface was lost by a previous request")?;
        self.state.send_replace(RequestState::Idle);

        let prompt = prompt.into();
        let cancel = self.root.child_token();
        let session = StreamSession::with_state(self.options.policy, self.state.clone());
        tracing::debug!(request_id = %session.request_id(), "submitting prompt");

        let open = self.source.open(prompt);
        let deadline = self.options.deadline;
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            let timer = deadline.map(|limit| spawn_deadline(limit, task_cancel.clone()));
            let outcome = session.run_with(open, task_cancel, &mut surface).await;
            if let Some(timer) = timer {
                timer.abort();
            }
            (surface, outcome)
        });

        self.active = Some(ActiveRequest { cancel, handle });
        Ok(previous)
    }

    /// Cancels the active request, if any. The surface keeps what it shows.
    pub fn cancel(&self) {
        if let Some(active) = &self.active {
            active.cancel.cancel();
        }
    }

    /// Waits for the active request to end and returns its outcome.
    ///
    /// Safe to use in `select!`: dropping the future leaves the request running.
    ///
    /// # Errors
    /// Returns an error if the request task panicked.
    pub async fn finish(&mut self) -> Result<Option<StreamOutcome>> {
        let Some(active) = self.active.as_mut() else {
            return Ok(None);
        };
        let joined = (&mut active.handle).await;
        self.active = None;

        let (surface, outcome) = joined.map_err(|e| anyhow!("request task failed: {e}"))?;
        self.surface = Some(surface);
        Ok(Some(outcome))
    }

    /// Cancels everything, waits for the active request and returns the surface.
    ///
    /// # Errors
    /// Returns an error if the request task panicked.
    pub async fn shutdown(mut self) -> Result<Option<S>> {
        self.root.cancel();
        self.finish().await?;
        self.state.send_replace(RequestState::Idle);
        Ok(self.surface.take())
    }
}

impl<S> Drop for PromptController<S> {
    fn drop(&mut self) {
        self.root.cancel();
    }
}

fn spawn_deadline(limit: Duration, cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            () = cancel.cancelled() => {}
            () = tokio::time::sleep(limit) => {
                tracing::warn!(deadline_ms = limit.as_millis() as u64, "request deadline reached");
                cancel.cancel();
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use bytes::Bytes;
    use futures_util::{StreamExt, stream};
    use tokio::sync::mpsc;

    use super::*;
    use crate::backend::TransportError;
    use crate::core::surface::MemorySurface;

    type Feed = mpsc::UnboundedSender<TransportResult<Bytes>>;

    /// Hands out pre-registered streams in submission order.
    #[derive(Default)]
    struct ScriptedSource {
        streams: Mutex<VecDeque<TransportResult<ByteStream>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedSource {
        fn push_channel(&self) -> Feed {
            let (tx, rx) = mpsc::unbounded_channel();
            let stream =
                stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) })
                    .boxed();
            self.streams.lock().unwrap().push_back(Ok(stream));
            tx
        }

        fn push_error(&self, err: TransportError) {
            self.streams.lock().unwrap().push_back(Err(err));
        }
    }

    impl PromptSource for ScriptedSource {
        fn open(&self, prompt: String) -> BoxFuture<'static, TransportResult<ByteStream>> {
            self.prompts.lock().unwrap().push(prompt);
            let next = self
                .streams
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TransportError::body("no scripted stream")));
            async move { next }.boxed()
        }
    }

    fn controller_over<S>(source: &Arc<ScriptedSource>, surface: S) -> PromptController<S>
    where
        S: DisplaySurface + Send + 'static,
    {
        let source: Arc<dyn PromptSource> = Arc::clone(source) as Arc<dyn PromptSource>;
        PromptController::new(source, surface, ControllerOptions::default())
    }

    fn send(feed: &Feed, text: &'static str) {
        feed.send(Ok(Bytes::from_static(text.as_bytes()))).unwrap();
    }

    async fn wait_for(rx: &mut watch::Receiver<RequestState>, state: RequestState) {
        rx.wait_for(|s| *s == state).await.unwrap();
    }

    #[tokio::test]
    async fn test_submit_streams_to_completion() {
        let source = Arc::new(ScriptedSource::default());
        let feed = source.push_channel();
        let mut controller = controller_over(&source, MemorySurface::new());

        controller.submit("What is Rust?").await.unwrap();
        assert!(controller.is_active());
        send(&feed, "Rust is a ");
        send(&feed, "*systems* language.");
        drop(feed);

        let outcome = controller.finish().await.unwrap().unwrap();
        assert_eq!(outcome.state, RequestState::Completed);
        assert_eq!(outcome.buffer, "Rust is a *systems* language.");
        assert_eq!(controller.current_state(), RequestState::Completed);
        assert_eq!(
            controller.surface().unwrap().current(),
            "<p>Rust is a <em>systems</em> language.</p>\n"
        );
        assert_eq!(source.prompts.lock().unwrap().as_slice(), ["What is Rust?"]);
    }

    #[tokio::test]
    async fn test_second_submit_cancels_first_and_starts_clean() {
        let source = Arc::new(ScriptedSource::default());
        let first = source.push_channel();
        let second = source.push_channel();
        let mut controller = controller_over(&source, MemorySurface::new());
        let mut state = controller.state();

        controller.submit("first").await.unwrap();
        send(&first, "first answer");
        wait_for(&mut state, RequestState::Streaming).await;
        tokio::task::yield_now().await;

        let replaced = controller.submit("second").await.unwrap().unwrap();
        assert_eq!(replaced.state, RequestState::Canceled);

        // Late data for the first request goes nowhere.
        let _ = first.send(Ok(Bytes::from_static(b" ignored")));
        send(&second, "second answer");
        drop(second);

        let outcome = controller.finish().await.unwrap().unwrap();
        assert_eq!(outcome.state, RequestState::Completed);
        assert_eq!(outcome.buffer, "second answer");
        assert_eq!(controller.surface().unwrap().current(), "<p>second answer</p>\n");
        assert_ne!(replaced.request_id, outcome.request_id);
    }

    /// Reports every replacement so tests can wait for a render.
    struct NotifySurface {
        inner: MemorySurface,
        rendered: mpsc::UnboundedSender<String>,
    }

    impl DisplaySurface for NotifySurface {
        fn replace(&mut self, html: &str) {
            self.inner.replace(html);
            let _ = self.rendered.send(html.to_string());
        }
    }

    #[tokio::test]
    async fn test_user_cancel_keeps_partial_output() {
        let source = Arc::new(ScriptedSource::default());
        let feed = source.push_channel();
        let (rendered_tx, mut rendered) = mpsc::unbounded_channel();
        let surface = NotifySurface {
            inner: MemorySurface::new(),
            rendered: rendered_tx,
        };
        let mut controller = controller_over(&source, surface);

        controller.submit("prompt").await.unwrap();
        send(&feed, "one ");
        send(&feed, "two ");
        while rendered.recv().await.unwrap() != "<p>one two</p>\n" {}

        controller.cancel();
        send(&feed, "three");

        let outcome = controller.finish().await.unwrap().unwrap();
        assert_eq!(outcome.state, RequestState::Canceled);
        assert_eq!(outcome.buffer, "one two ");
        assert_eq!(outcome.chunks, 2);
        assert_eq!(controller.surface().unwrap().inner.current(), "<p>one two</p>\n");
    }

    #[tokio::test]
    async fn test_http_error_status_fails_with_detail() {
        let source = Arc::new(ScriptedSource::default());
        source.push_error(TransportError::http_status(404, r#"{"detail":"Chat not found."}"#));
        let mut controller = controller_over(&source, MemorySurface::new());

        controller.submit("prompt").await.unwrap();
        let outcome = controller.finish().await.unwrap().unwrap();

        assert_eq!(outcome.state, RequestState::Failed);
        assert!(outcome.buffer.is_empty());
        assert!(outcome.html.contains("HTTP 404: Chat not found."));
        assert!(outcome.html.contains("role=\"alert\""));
    }

    #[tokio::test]
    async fn test_mid_stream_error_fails_with_partial_output() {
        let source = Arc::new(ScriptedSource::default());
        let feed = source.push_channel();
        let mut controller = controller_over(&source, MemorySurface::new());

        controller.submit("prompt").await.unwrap();
        send(&feed, "Partial");
        feed.send(Err(TransportError::body("connection reset"))).unwrap();

        let outcome = controller.finish().await.unwrap().unwrap();
        assert_eq!(outcome.state, RequestState::Failed);
        assert_eq!(outcome.buffer, "Partial");
        assert!(outcome.html.starts_with("<p>Partial</p>\n"));
        assert!(outcome.html.contains("connection reset"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_cancels_like_user() {
        let source = Arc::new(ScriptedSource::default());
        let feed = source.push_channel();
        let options = ControllerOptions {
            deadline: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        let mut controller = PromptController::new(source, MemorySurface::new(), options);

        controller.submit("slow").await.unwrap();
        send(&feed, "partial");

        let outcome = controller.finish().await.unwrap().unwrap();
        assert_eq!(outcome.state, RequestState::Canceled);
        assert_eq!(outcome.buffer, "partial");
        assert!(outcome.error.is_none());
        drop(feed);
    }

    #[tokio::test]
    async fn test_shutdown_returns_surface() {
        let source = Arc::new(ScriptedSource::default());
        let _feed = source.push_channel();
        let mut controller = controller_over(&source, MemorySurface::new());

        controller.submit("prompt").await.unwrap();
        let surface = controller.shutdown().await.unwrap().unwrap();
        assert_eq!(surface.history()[0], "");
    }
}
