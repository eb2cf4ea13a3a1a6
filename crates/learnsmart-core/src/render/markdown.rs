//! Markdown to HTML formatting.

use pulldown_cmark::{Options, Parser, html};

fn markdown_options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options
}

/// Converts markdown to (unsanitized) HTML.
///
/// Never fails: unterminated fences run to the end of the text, unmatched
/// emphasis markers stay literal, and raw HTML is passed through for the
/// sanitizer to deal with.
pub fn markdown_to_html(text: &str) -> String {
    let parser = Parser::new_ext(text, markdown_options());
    let mut out = String::with_capacity(text.len() + text.len() / 2);
    html::push_html(&mut out, parser);
    out
}
