//! Block-structure scan used by the incremental render path.
//!
//! Finds the last offset where the buffer can be cut so that rendering the
//! two halves separately gives the same HTML as rendering the whole, and
//! reports constructs that make any cut unsafe.

/// Result of scanning an accumulated buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BlockScan {
    /// A fenced code block is open at the end of the buffer.
    pub open_fence: bool,
    /// Raw HTML (or an autolink) appears somewhere in the buffer.
    pub raw_html: bool,
    /// A link reference definition may appear; it can change earlier blocks.
    pub link_definitions: bool,
    /// Fence placement the line scan cannot resolve: a fence marker inside a
    /// list item or blockquote, right after a table row, or a bare `\r`
    /// line ending.
    pub ambiguous_fence: bool,
    /// Byte offset of the start of the last block that begins fresh.
    pub last_safe_split: Option<usize>,
}

impl BlockScan {
    /// True when the buffer must be rendered as a whole.
    pub fn needs_full_render(&self) -> bool {
        self.open_fence || self.raw_html || self.link_definitions || self.ambiguous_fence
    }
}

/// Scans `text` line by line.
///
/// A split is safe at the start of a line that follows a blank line outside
/// any fence, and whose first character cannot continue an earlier block
/// (no indentation, list marker or blockquote marker).
///
/// Only fences that start in the first column are tracked. A fence opened
/// inside a container is closed by its container, so any indented or
/// container-prefixed fence line marks the scan as ambiguous instead.
pub fn scan(text: &str) -> BlockScan {
    let mut fence: Option<(char, usize)> = None;
    let mut ambiguous_fence = false;
    let mut prev_blank = false;
    let mut prev_table_row = false;
    let mut last_safe_split = None;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let start = offset;
        offset += line.len();
        let content = line.trim_end_matches(['\n', '\r']);
        if line.trim_end_matches("\r\n").trim_end_matches('\n').contains('\r') {
            ambiguous_fence = true;
        }

        if let Some((marker, len)) = fence {
            if is_closing_fence(content, marker, len) {
                fence = None;
            }
            prev_blank = false;
            prev_table_row = false;
            continue;
        }

        let blank = content.trim().is_empty();
        if prev_blank && !blank && starts_fresh_block(content) {
            last_safe_split = Some(start);
        }
        if starts_fresh_block(content) {
            fence = parse_fence_marker(content);
            // A table may absorb the line as a row.
            if fence.is_some() && prev_table_row {
                ambiguous_fence = true;
            }
        } else if has_nested_fence(content) {
            ambiguous_fence = true;
        }
        prev_blank = blank && line.ends_with('\n');
        prev_table_row = !blank && content.contains('|');
    }

    BlockScan {
        open_fence: fence.is_some(),
        raw_html: text.contains('<'),
        link_definitions: text.contains("]:"),
        ambiguous_fence,
        last_safe_split,
    }
}

fn starts_fresh_block(line: &str) -> bool {
    match line.chars().next() {
        Some(c) => !(c.is_whitespace() || c.is_ascii_digit() || matches!(c, '-' | '*' | '+' | '>')),
        None => false,
    }
}

/// A fence marker behind indentation or container markers.
fn has_nested_fence(line: &str) -> bool {
    let rest = line.trim_start_matches(|c: char| {
        c.is_whitespace() || c.is_ascii_digit() || matches!(c, '-' | '*' | '+' | '>' | '.' | ')')
    });
    rest.starts_with("```") || rest.starts_with("~~~")
}

/// Strips up to three leading spaces; more means indented code, not a fence.
fn strip_fence_indent(line: &str) -> Option<&str> {
    let indent = line.len() - line.trim_start_matches(' ').len();
    (indent <= 3).then(|| &line[indent..])
}

fn parse_fence_marker(line: &str) -> Option<(char, usize)> {
    let trimmed = strip_fence_indent(line)?;
    let first = trimmed.chars().next()?;
    if first != '`' && first != '~' {
        return None;
    }
    let len = trimmed.chars().take_while(|&c| c == first).count();
    if len < 3 {
        return None;
    }
    // Backtick fences may not carry backticks in their info string.
    if first == '`' && trimmed[len..].contains('`') {
        return None;
    }
    Some((first, len))
}

fn is_closing_fence(line: &str, marker: char, open_len: usize) -> bool {
    let Some(trimmed) = strip_fence_indent(line) else {
        return false;
    };
    let len = trimmed.chars().take_while(|&c| c == marker).count();
    len >= open_len && trimmed[len..].trim().is_empty()
}
