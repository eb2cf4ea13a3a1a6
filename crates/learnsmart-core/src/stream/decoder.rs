//! Stateful UTF-8 decoding across chunk boundaries.

use std::borrow::Cow;

/// Incremental UTF-8 decoder.
///
/// A character whose bytes are split across two chunks is held back until the
/// rest arrives. Invalid sequences are replaced with U+FFFD, one replacement
/// per maximal invalid subsequence, so decoding a byte sequence piecewise
/// yields exactly `String::from_utf8_lossy` of the whole sequence.
#[derive(Debug, Default, Clone)]
pub struct Utf8StreamDecoder {
    /// Incomplete trailing sequence from the previous chunk (at most 3 bytes).
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `bytes`, returning every complete character now available.
    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let input: Cow<'_, [u8]> = if self.pending.is_empty() {
            Cow::Borrowed(bytes)
        } else {
            let mut joined = std::mem::take(&mut self.pending);
            joined.extend_from_slice(bytes);
            Cow::Owned(joined)
        };

        let mut out = String::with_capacity(input.len());
        let mut rest: &[u8] = &input;
        loop {
            match std::str::from_utf8(rest) {
                Ok(valid) => {
                    out.push_str(valid);
                    break;
                }
                Err(err) => {
                    let (valid, after) = rest.split_at(err.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    if let Some(invalid_len) = err.error_len() {
                        out.push(char::REPLACEMENT_CHARACTER);
                        rest = &after[invalid_len..];
                    } else {
                        // Truncated sequence at the end: wait for more bytes.
                        self.pending = after.to_vec();
                        break;
                    }
                }
            }
        }
        out
    }

    /// Flushes the decoder at end of stream.
    ///
    /// A truncated trailing sequence becomes a single U+FFFD.
    pub fn finish(&mut self) -> String {
        let pending = std::mem::take(&mut self.pending);
        String::from_utf8_lossy(&pending).into_owned()
    }

    /// Returns true if bytes are held back waiting for the rest of a character.
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}
