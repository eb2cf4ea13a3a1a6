//! Markdown-then-sanitize rendering of the accumulated response buffer.
//!
//! Every value returned from this module has gone through the sanitizer.

pub mod blocks;
pub mod markdown;
pub mod sanitize;

use serde::{Deserialize, Serialize};

pub use markdown::markdown_to_html;
pub use sanitize::Sanitizer;

/// How the buffer is re-rendered as fragments arrive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderPolicy {
    /// Re-render the full buffer on every fragment.
    #[default]
    WholeBuffer,
    /// Cache the rendered stable prefix and re-render only the tail.
    Incremental,
}

impl RenderPolicy {
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "whole_buffer" | "whole" => Some(Self::WholeBuffer),
            "incremental" => Some(Self::Incremental),
            _ => None,
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::WholeBuffer => "whole_buffer",
            Self::Incremental => "incremental",
        }
    }
}

/// Markdown + sanitize of a complete document, no caching.
pub fn render_document(sanitizer: &Sanitizer, text: &str) -> String {
    sanitizer.clean(&markdown_to_html(text))
}

#[derive(Debug, Default)]
struct StablePrefix {
    source_len: usize,
    html: String,
}

/// Renders a growing buffer under a [`RenderPolicy`].
///
/// Under `Incremental` the pipeline remembers the sanitized HTML of the part
/// of the buffer that later text can no longer change. The cache is keyed on
/// the prefix length only, so callers must `reset` when starting a new buffer.
#[derive(Debug)]
pub struct RenderPipeline {
    policy: RenderPolicy,
    sanitizer: Sanitizer,
    stable: StablePrefix,
}

impl RenderPipeline {
    pub fn new(policy: RenderPolicy) -> Self {
        Self {
            policy,
            sanitizer: Sanitizer::new(),
            stable: StablePrefix::default(),
        }
    }

    pub fn policy(&self) -> RenderPolicy {
        self.policy
    }

    /// Sanitizes markup produced outside the markdown step.
    pub fn sanitize(&self, html: &str) -> String {
        self.sanitizer.clean(html)
    }

    /// Drops the cached prefix.
    pub fn reset(&mut self) {
        self.stable = StablePrefix::default();
    }

    /// Renders the full accumulated `buffer` to sanitized HTML.
    pub fn render(&mut self, buffer: &str) -> String {
        match self.policy {
            RenderPolicy::WholeBuffer => render_document(&self.sanitizer, buffer),
            RenderPolicy::Incremental => self.render_incremental(buffer),
        }
    }

    fn render_incremental(&mut self, buffer: &str) -> String {
        let scan = blocks::scan(buffer);
        if scan.needs_full_render() {
            self.reset();
            return render_document(&self.sanitizer, buffer);
        }

        if buffer.len() < self.stable.source_len || !buffer.is_char_boundary(self.stable.source_len)
        {
            self.reset();
        }

        if let Some(split) = scan.last_safe_split
            && split > self.stable.source_len
        {
            let segment = &buffer[self.stable.source_len..split];
            let html = render_document(&self.sanitizer, segment);
            self.stable.html.push_str(&html);
            self.stable.source_len = split;
            tracing::trace!(stable_len = split, "extended stable prefix");
        }

        let tail = render_document(&self.sanitizer, &buffer[self.stable.source_len..]);
        let mut out = String::with_capacity(self.stable.html.len() + tail.len());
        out.push_str(&self.stable.html);
        out.push_str(&tail);
        out
    }
}

impl Default for RenderPipeline {
    fn default() -> Self {
        Self::new(RenderPolicy::default())
    }
}
