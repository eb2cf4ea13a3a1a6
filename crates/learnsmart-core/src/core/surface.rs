//! Display surfaces: where sanitized HTML ends up.

/// A place that shows the rendered response.
///
/// The only operation is a full replacement; surfaces never see partial
/// updates, and they only ever receive sanitized HTML.
pub trait DisplaySurface {
    fn replace(&mut self, html: &str);
}

impl<S: DisplaySurface + ?Sized> DisplaySurface for Box<S> {
    fn replace(&mut self, html: &str) {
        (**self).replace(html);
    }
}

/// In-memory surface that keeps every replacement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySurface {
    history: Vec<String>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content currently shown.
    pub fn current(&self) -> &str {
        self.history.last().map_or("", String::as_str)
    }

    /// Every value passed to `replace`, oldest first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn replacements(&self) -> usize {
        self.history.len()
    }
}

impl DisplaySurface for MemorySurface {
    fn replace(&mut self, html: &str) {
        self.history.push(html.to_string());
    }
}
