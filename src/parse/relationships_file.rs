//! Parser for `relationships.tmdl`.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::emit::quote::unquote;
use crate::util::{strip_bom, to_lf};

use super::lexer::{block_end, is_blank, split_property, trivia_text};

static GUID_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("guid regex")
});

/// One parsed relationship block.
#[derive(Debug, Clone)]
pub struct ParsedRelationship {
    pub guid: String,
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
    pub is_active: bool,
    pub rely_on_referential_integrity: bool,
    /// Carries the `/// User-added relationship` marker from a prior merge.
    pub user_marked: bool,
    pub verbatim: String,
}

/// Result of parsing the relationships file: recognised blocks, verbatim
/// blocks that did not parse, and warnings.
#[derive(Debug, Default)]
pub struct ParsedRelationships {
    pub relationships: Vec<ParsedRelationship>,
    pub unknown_blocks: Vec<String>,
    pub warnings: Vec<String>,
}

/// Split a `Table.Column` reference where either part may be single-quoted
/// with doubled internal quotes.
pub fn split_column_ref(s: &str) -> Option<(String, String)> {
    let s = s.trim();
    let (table_raw, rest) = if let Some(tail) = s.strip_prefix('\'') {
        let bytes = tail.as_bytes();
        let mut i = 0;
        loop {
            if i >= bytes.len() {
                return None;
            }
            if bytes[i] == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                    continue;
                }
                break;
            }
            i += 1;
        }
        (tail[..i].replace("''", "'"), &tail[i + 1..])
    } else {
        let dot = s.find('.')?;
        (s[..dot].to_string(), &s[dot..])
    };
    let column_raw = rest.strip_prefix('.')?;
    let column = unquote(column_raw);
    if table_raw.is_empty() || column.is_empty() {
        return None;
    }
    Some((table_raw, column))
}

/// Parse the whole relationships file.
pub fn parse_relationships_file(text: &str) -> ParsedRelationships {
    let normalized = to_lf(strip_bom(text));
    let lines: Vec<&str> = normalized.lines().collect();

    let mut result = ParsedRelationships::default();

    let mut pending_trivia_start: Option<usize> = None;
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if is_blank(line) {
            pending_trivia_start = None;
            i += 1;
            continue;
        }
        if trivia_text(line).is_some() {
            pending_trivia_start.get_or_insert(i);
            i += 1;
            continue;
        }
        let content = line.trim_start();
        let block_start = pending_trivia_start.take().unwrap_or(i);
        let end = block_end(&lines, i);
        let mut verbatim = lines[block_start..end].join("\n");
        verbatim.push('\n');

        if let Some(rest) = content.strip_prefix("relationship ") {
            match parse_relationship_block(&lines, i, end, rest.trim(), &verbatim) {
                Ok(relationship) => result.relationships.push(relationship),
                Err(reason) => {
                    result.warnings.push(reason);
                    result.unknown_blocks.push(verbatim);
                }
            }
        } else {
            result
                .warnings
                .push(format!("unrecognised block starting '{content}'"));
            result.unknown_blocks.push(verbatim);
        }
        i = end;
    }

    result
}

fn parse_relationship_block(
    lines: &[&str],
    header: usize,
    end: usize,
    name: &str,
    verbatim: &str,
) -> Result<ParsedRelationship, String> {
    if !GUID_RE.is_match(name) {
        return Err(format!("relationship name '{name}' is not a GUID"));
    }

    let mut from: Option<(String, String)> = None;
    let mut to: Option<(String, String)> = None;
    let mut is_active = true;
    let mut rely = false;

    for line in &lines[header + 1..end] {
        if is_blank(line) {
            continue;
        }
        let content = line.trim_start();
        if content == "relyOnReferentialIntegrity" {
            rely = true;
            continue;
        }
        if let Some((prop, value)) = split_property(content) {
            match prop {
                "fromColumn" => from = split_column_ref(value),
                "toColumn" => to = split_column_ref(value),
                "isActive" => is_active = !value.eq_ignore_ascii_case("false"),
                "relyOnReferentialIntegrity" => {
                    rely = value.eq_ignore_ascii_case("true");
                }
                _ => {}
            }
        }
    }

    let (from_table, from_column) =
        from.ok_or_else(|| format!("relationship {name} has no parseable fromColumn"))?;
    let (to_table, to_column) =
        to.ok_or_else(|| format!("relationship {name} has no parseable toColumn"))?;

    Ok(ParsedRelationship {
        guid: name.to_lowercase(),
        from_table,
        from_column,
        to_table,
        to_column,
        is_active,
        rely_on_referential_integrity: rely,
        user_marked: verbatim.trim_start().starts_with("/// User-added relationship"),
        verbatim: verbatim.to_string(),
    })
}
