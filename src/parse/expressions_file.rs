//! Parser for `expressions.tmdl` — only the shared expression values the
//! generator manages.

use crate::util::{strip_bom, to_lf};

use super::lexer::{block_end, indent_width, is_blank, split_property};

/// A named expression recovered from the file.
#[derive(Debug, Clone)]
pub struct ParsedExpression {
    pub name: String,
    /// Single-line string literal value, unescaped.
    pub value: Option<String>,
    pub lineage_tag: Option<String>,
}

/// Extract every top-level `expression <name> = "<literal>" …` block.
pub fn parse_expressions_file(text: &str) -> Vec<ParsedExpression> {
    let normalized = to_lf(strip_bom(text));
    let lines: Vec<&str> = normalized.lines().collect();

    let mut expressions = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if is_blank(line) || indent_width(line) > 0 {
            i += 1;
            continue;
        }
        let Some(rest) = line.trim_start().strip_prefix("expression ") else {
            i += 1;
            continue;
        };
        let end = block_end(&lines, i);

        let (name, tail) = match rest.split_once('=') {
            Some((name, tail)) => (name.trim().to_string(), tail),
            None => (rest.trim().to_string(), ""),
        };
        let value = string_literal(tail);

        let mut lineage_tag = None;
        for body_line in &lines[i + 1..end] {
            if let Some((prop, v)) = split_property(body_line.trim_start()) {
                if prop == "lineageTag" {
                    lineage_tag = Some(v.to_string());
                }
            }
        }

        expressions.push(ParsedExpression {
            name,
            value,
            lineage_tag,
        });
        i = end;
    }
    expressions
}

/// Find a specific expression's string value.
pub fn expression_value(text: &str, name: &str) -> Option<String> {
    parse_expressions_file(text)
        .into_iter()
        .find(|e| e.name.eq_ignore_ascii_case(name))
        .and_then(|e| e.value)
}

/// First double-quoted literal in `tail`, unescaping doubled quotes.
fn string_literal(tail: &str) -> Option<String> {
    let start = tail.find('"')? + 1;
    let rest = &tail[start..];
    let bytes = rest.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'"' {
            if bytes.get(i + 1) == Some(&b'"') {
                i += 2;
                continue;
            }
            return Some(rest[..i].replace("\"\"", "\""));
        }
        i += 1;
    }
    None
}
