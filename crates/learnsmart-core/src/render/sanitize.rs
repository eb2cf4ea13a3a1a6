//! HTML sanitization for model-generated prose.
//!
//! Allow-list:
//! - tags: headings, paragraphs, emphasis, lists, blockquotes, tables, rules,
//!   links, images, code blocks, plus `div`/`span` for notices
//! - attributes: `a[href]`, `img[src|alt|width|height]`, `code[class]`,
//!   `div[class|role]`, `span[class]`, `th|td[align]`, `ol[start]`, and
//!   `title`/`lang` everywhere
//! - URL schemes: `http`, `https`, `mailto`; relative URLs are dropped
//!
//! `script` and `style` are removed with their content. Event handler
//! attributes never appear in the allow-list, so they never survive.

use std::collections::{HashMap, HashSet};

use ammonia::{Builder, UrlRelative};

const ALLOWED_TAGS: &[&str] = &[
    "a",
    "blockquote",
    "br",
    "code",
    "del",
    "div",
    "em",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "hr",
    "img",
    "li",
    "ol",
    "p",
    "pre",
    "span",
    "strong",
    "table",
    "tbody",
    "td",
    "th",
    "thead",
    "tr",
    "ul",
];

const TAG_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href"]),
    ("img", &["src", "alt", "width", "height"]),
    ("code", &["class"]),
    ("div", &["class", "role"]),
    ("span", &["class"]),
    ("th", &["align"]),
    ("td", &["align"]),
    ("ol", &["start"]),
];

const GENERIC_ATTRIBUTES: &[&str] = &["title", "lang"];

const URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Allow-list HTML sanitizer.
///
/// Construction builds the allow-list once; `clean` is pure and
/// deterministic, so the same input always yields the same output.
pub struct Sanitizer {
    builder: Builder<'static>,
}

impl Sanitizer {
    pub fn new() -> Self {
        let tag_attributes: HashMap<&'static str, HashSet<&'static str>> = TAG_ATTRIBUTES
            .iter()
            .map(|(tag, attrs)| (*tag, attrs.iter().copied().collect()))
            .collect();

        let mut builder = Builder::default();
        builder
            .tags(ALLOWED_TAGS.iter().copied().collect())
            .tag_attributes(tag_attributes)
            .generic_attributes(GENERIC_ATTRIBUTES.iter().copied().collect())
            .url_schemes(URL_SCHEMES.iter().copied().collect())
            .url_relative(UrlRelative::Deny)
            .link_rel(Some("noopener noreferrer"));

        Self { builder }
    }

    /// Strips everything outside the allow-list. Never fails.
    pub fn clean(&self, html: &str) -> String {
        self.builder.clean(html).to_string()
    }
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Sanitizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sanitizer").finish_non_exhaustive()
    }
}
