//! Display surfaces for the terminal.

use std::io::Write;

use learnsmart_core::core::DisplaySurface;

/// Keeps only the latest HTML. Used when the answer is printed once at the end.
#[derive(Debug, Default)]
pub struct LatestSurface {
    html: String,
}

impl LatestSurface {
    pub fn html(&self) -> &str {
        &self.html
    }
}

impl DisplaySurface for LatestSurface {
    fn replace(&mut self, html: &str) {
        html.clone_into(&mut self.html);
    }
}

/// Streams HTML to a writer as it grows.
///
/// When a replacement extends what is already shown, only the new suffix is
/// written. Otherwise (an emphasis closing, a fence opening) the whole value
/// is redrawn on a fresh line. An empty replacement starts a new answer.
#[derive(Debug)]
pub struct TerminalSurface<W: Write> {
    out: W,
    shown: String,
}

impl<W: Write> TerminalSurface<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            shown: String::new(),
        }
    }

    /// Ends the current answer with a newline if anything was written.
    ///
    /// Also happens implicitly when the next answer starts.
    pub fn end_answer(&mut self) {
        if !self.shown.is_empty() && !self.shown.ends_with('\n') {
            self.write(b"\n");
        }
        self.shown.clear();
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, bytes: &[u8]) {
        let result = self.out.write_all(bytes).and_then(|()| self.out.flush());
        if let Err(e) = result {
            tracing::warn!("terminal write failed: {e}");
        }
    }
}

impl<W: Write> DisplaySurface for TerminalSurface<W> {
    fn replace(&mut self, html: &str) {
        if html.is_empty() {
            self.end_answer();
            return;
        }

        match html.strip_prefix(self.shown.as_str()) {
            Some(delta) => self.write(delta.as_bytes()),
            None => {
                if !self.shown.ends_with('\n') {
                    self.write(b"\n");
                }
                self.write(html.as_bytes());
            }
        }
        html.clone_into(&mut self.shown);
    }
}
