//! Turns a response body byte stream into ordered text fragments.

use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use super::decoder::Utf8StreamDecoder;
use crate::backend::{ByteStream, TransportError, TransportResult};

/// One step of a consumed stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// Decoded text, in arrival order. Never empty.
    Chunk(String),
    /// The body ended normally; pending bytes have been flushed.
    End,
    /// The cancellation token fired; nothing more will be read.
    Canceled,
}

/// Pulls chunks from a byte stream and decodes them statefully.
///
/// Owns the response body for the lifetime of the request. A transport
/// error terminates the sequence; later calls report `End`. Bytes the decoder
/// still holds when the error arrives are flushed as a final chunk first.
pub struct StreamConsumer {
    inner: ByteStream,
    decoder: Utf8StreamDecoder,
    cancel: CancellationToken,
    pending_error: Option<TransportError>,
    finished: bool,
    chunks_read: usize,
    bytes_read: u64,
}

impl StreamConsumer {
    pub fn new(inner: ByteStream, cancel: CancellationToken) -> Self {
        Self {
            inner,
            decoder: Utf8StreamDecoder::new(),
            cancel,
            pending_error: None,
            finished: false,
            chunks_read: 0,
            bytes_read: 0,
        }
    }

    /// Waits for the next decoded fragment.
    ///
    /// Cancellation is checked before reading and raced against the pending
    /// read, so a chunk still in flight when the token fires is dropped.
    ///
    /// # Errors
    /// Returns the transport error that ended the stream.
    pub async fn next_chunk(&mut self) -> TransportResult<StreamItem> {
        if self.cancel.is_cancelled() {
            return Ok(StreamItem::Canceled);
        }
        if let Some(err) = self.pending_error.take() {
            return Err(err);
        }
        if self.finished {
            return Ok(StreamItem::End);
        }

        loop {
            let next = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(StreamItem::Canceled),
                next = self.inner.next() => next,
            };

            match next {
                Some(Ok(bytes)) => {
                    self.bytes_read += bytes.len() as u64;
                    let text = self.decoder.decode(&bytes);
                    if text.is_empty() {
                        continue;
                    }
                    self.chunks_read += 1;
                    return Ok(StreamItem::Chunk(text));
                }
                Some(Err(err)) => {
                    self.finished = true;
                    let tail = self.decoder.finish();
                    if tail.is_empty() {
                        return Err(err);
                    }
                    self.pending_error = Some(err);
                    self.chunks_read += 1;
                    return Ok(StreamItem::Chunk(tail));
                }
                None => {
                    self.finished = true;
                    let tail = self.decoder.finish();
                    if tail.is_empty() {
                        return Ok(StreamItem::End);
                    }
                    self.chunks_read += 1;
                    return Ok(StreamItem::Chunk(tail));
                }
            }
        }
    }

    /// Number of non-empty fragments yielded so far.
    pub fn chunks_read(&self) -> usize {
        self.chunks_read
    }

    /// Raw body bytes received so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }
}
