//! Raw request/response capture for debugging a backend exchange.
//!
//! Enabled by `debug = true` in config or by `LEARNSMART_DEBUG_TRACE`
//! (`1`/`true` for the default directory, otherwise a directory path).

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::{SystemTime, UNIX_EPOCH};

use futures_util::{Stream, StreamExt};

use super::shared::{ByteStream, TransportResult};

static TRACE_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone)]
pub struct DebugTrace {
    id: String,
    dir: PathBuf,
}

impl DebugTrace {
    /// Returns a trace target when tracing is requested and the directory is writable.
    pub fn from_env(debug: bool) -> Option<Self> {
        let raw = std::env::var("LEARNSMART_DEBUG_TRACE").unwrap_or_default();
        let trimmed = raw.trim();

        let dir = if trimmed.is_empty() {
            if !debug {
                return None;
            }
            Self::default_dir()
        } else if trimmed == "1" || trimmed.eq_ignore_ascii_case("true") {
            Self::default_dir()
        } else {
            PathBuf::from(trimmed)
        };

        Self::in_dir(dir)
    }

    /// Creates a trace rooted at `dir`, creating it if needed.
    pub fn in_dir(dir: PathBuf) -> Option<Self> {
        if fs::create_dir_all(&dir).is_err() {
            return None;
        }

        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let counter = TRACE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let id = format!("prompt_{ts}_{counter}");

        Some(Self { id, dir })
    }

    fn default_dir() -> PathBuf {
        std::env::temp_dir().join("learnsmart-trace")
    }

    pub fn write_request(&self, body: &[u8]) {
        if let Ok(mut file) = File::create(self.request_path()) {
            let _ = file.write_all(body);
            let _ = file.flush();
        }
    }

    pub fn response_writer(&self) -> Option<BufWriter<File>> {
        File::create(self.response_path()).ok().map(BufWriter::new)
    }

    pub fn request_path(&self) -> PathBuf {
        self.dir.join(format!("{}_request.json", self.id))
    }

    pub fn response_path(&self) -> PathBuf {
        self.dir.join(format!("{}_response.txt", self.id))
    }
}

/// Copies every body chunk into a file while passing it through unchanged.
struct TeeStream {
    inner: ByteStream,
    sink: Option<BufWriter<File>>,
}

impl Stream for TeeStream {
    type Item = TransportResult<bytes::Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match self.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(bytes))) => {
                let mut disable = false;
                if let Some(sink) = &mut self.sink
                    && sink.write_all(&bytes).is_err()
                {
                    disable = true;
                }
                if disable {
                    self.sink = None;
                }
                Poll::Ready(Some(Ok(bytes)))
            }
            Poll::Ready(Some(Err(err))) => Poll::Ready(Some(Err(err))),
            Poll::Ready(None) => {
                if let Some(sink) = &mut self.sink {
                    let _ = sink.flush();
                }
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

/// Wraps `stream` so its bytes are also written to the trace's response file.
pub fn wrap_stream(trace: Option<&DebugTrace>, stream: ByteStream) -> ByteStream {
    if let Some(trace) = trace
        && let Some(sink) = trace.response_writer()
    {
        return TeeStream {
            inner: stream,
            sink: Some(sink),
        }
        .boxed();
    }

    stream
}
