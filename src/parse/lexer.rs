//! Line-level TMDL lexing.
//!
//! TMDL is indentation-based; the parser never needs more than a per-line
//! classification plus a block-extent rule. Input is LF-normalised before it
//! reaches this module.

/// Indentation weight of a line. Tabs are the emitted convention; spaces are
/// tolerated at a 4:1 ratio so hand-reformatted files still parse.
pub fn indent_width(line: &str) -> usize {
    let mut width = 0;
    for c in line.chars() {
        match c {
            '\t' => width += 4,
            ' ' => width += 1,
            _ => break,
        }
    }
    width
}

pub fn is_blank(line: &str) -> bool {
    line.trim().is_empty()
}

/// The text of a `///` trivia line, trimmed, or `None`.
pub fn trivia_text(line: &str) -> Option<&str> {
    line.trim_start().strip_prefix("///").map(str::trim)
}

/// Split `name: value` property content. The value may be empty.
pub fn split_property(content: &str) -> Option<(&str, &str)> {
    let idx = content.find(':')?;
    let name = content[..idx].trim();
    if name.is_empty() || name.contains(' ') {
        return None;
    }
    Some((name, content[idx + 1..].trim()))
}

/// Extent of the block owned by the header at `start`: the header line plus
/// every following line that is blank or indented deeper than the header.
/// Trailing blank separator lines are not part of the block.
pub fn block_end(lines: &[&str], start: usize) -> usize {
    let header_indent = indent_width(lines[start]);
    let mut last_owned = start;
    let mut i = start + 1;
    while i < lines.len() {
        let line = lines[i];
        if is_blank(line) {
            i += 1;
            continue;
        }
        if indent_width(line) <= header_indent {
            break;
        }
        last_owned = i;
        i += 1;
    }
    last_owned + 1
}

/// True when the trivia text is the generator's own logical-name marker: a
/// single bare identifier token. Anything else is user prose.
pub fn is_logical_name_marker(text: &str) -> bool {
    !text.is_empty()
        && !text.contains(char::is_whitespace)
        && text
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}
