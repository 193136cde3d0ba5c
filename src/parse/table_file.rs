//! Parser for the table TMDL files this tool emits.
//!
//! Only the emitted grammar is recognised. A block that fails to parse is
//! kept verbatim and treated as foreign: it is excluded from the diff and
//! never silently dropped.

use crate::emit::quote::unquote;
use crate::util::{strip_bom, to_lf};

use super::lexer::{
    block_end, indent_width, is_blank, is_logical_name_marker, split_property, trivia_text,
};

/// One parsed `column` block.
#[derive(Debug, Clone, Default)]
pub struct ParsedColumn {
    pub display_name: String,
    /// Source attribute recovered from the generator's `///` marker line.
    /// Absent on user-added columns.
    pub logical_name: Option<String>,
    /// Trivia lines that are not the logical-name marker: user descriptions.
    pub description: Vec<String>,
    pub data_type: Option<String>,
    pub source_column: Option<String>,
    pub format_string: Option<String>,
    pub summarize_by: Option<String>,
    pub source_provider_type: Option<String>,
    pub lineage_tag: Option<String>,
    pub is_hidden: bool,
    pub is_key: bool,
    pub is_default_label: bool,
    /// Raw annotation payloads (`Name = Value`).
    pub annotations: Vec<String>,
    /// The block exactly as read, for round-tripping.
    pub verbatim: String,
}

/// One parsed `measure` block, kept verbatim.
#[derive(Debug, Clone)]
pub struct ParsedMeasure {
    pub name: String,
    pub lineage_tag: Option<String>,
    pub verbatim: String,
}

/// A whole parsed table file.
#[derive(Debug, Clone, Default)]
pub struct ParsedTableFile {
    /// From the `/// Source: <logical_name>` file header trivia.
    pub source_logical_name: Option<String>,
    pub display_name: String,
    pub lineage_tag: Option<String>,
    /// `dataCategory: Time` marks the calendar table, which is never
    /// rewritten.
    pub is_date_table: bool,
    pub columns: Vec<ParsedColumn>,
    pub measures: Vec<ParsedMeasure>,
    /// Verbatim partition `source =` body.
    pub partition_body: Option<String>,
    /// Blocks that did not parse; excluded from the diff.
    pub unknown_blocks: Vec<String>,
    pub warnings: Vec<String>,
}

/// Outcome of reading a file under `definition/tables/`.
#[derive(Debug)]
pub enum TableFileOutcome {
    Table(ParsedTableFile),
    /// First non-trivia line is not a recognised `table` header.
    Foreign,
}

/// Parse one table file.
pub fn parse_table_file(text: &str) -> TableFileOutcome {
    let normalized = to_lf(strip_bom(text));
    let lines: Vec<&str> = normalized.lines().collect();

    let mut file = ParsedTableFile::default();

    // File-level trivia, then the table header.
    let mut i = 0;
    while i < lines.len() {
        let line = lines[i];
        if is_blank(line) {
            i += 1;
            continue;
        }
        if let Some(text) = trivia_text(line) {
            if let Some(logical) = text.strip_prefix("Source:") {
                file.source_logical_name = Some(logical.trim().to_string());
            }
            i += 1;
            continue;
        }
        break;
    }
    let header = match lines.get(i) {
        Some(line) if indent_width(line) == 0 && line.trim_start().starts_with("table ") => line,
        _ => return TableFileOutcome::Foreign,
    };
    file.display_name = unquote(header.trim_start().trim_start_matches("table ").trim());
    i += 1;

    // Table children.
    let mut pending_trivia_start: Option<usize> = None;
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

        if let Some(rest) = content.strip_prefix("column ") {
            let end = block_end(&lines, i);
            match parse_column_block(&lines, block_start, i, end, rest) {
                Ok(column) => file.columns.push(column),
                Err(reason) => {
                    file.warnings.push(reason);
                    file.unknown_blocks.push(verbatim(&lines, block_start, end));
                }
            }
            i = end;
        } else if let Some(rest) = content.strip_prefix("measure ") {
            let end = block_end(&lines, i);
            match parse_measure_block(&lines, block_start, i, end, rest) {
                Ok(measure) => file.measures.push(measure),
                Err(reason) => {
                    file.warnings.push(reason);
                    file.unknown_blocks.push(verbatim(&lines, block_start, end));
                }
            }
            i = end;
        } else if content.starts_with("partition") {
            let end = block_end(&lines, i);
            file.partition_body = extract_partition_body(&lines, i, end);
            i = end;
        } else if content.starts_with("annotation ") {
            let end = block_end(&lines, i);
            i = end;
        } else if let Some((name, value)) = split_property(content) {
            match name {
                "lineageTag" => file.lineage_tag = Some(value.to_string()),
                "dataCategory" if value.eq_ignore_ascii_case("Time") => {
                    file.is_date_table = true;
                }
                _ => {}
            }
            i += 1;
        } else {
            let end = block_end(&lines, i);
            file.warnings
                .push(format!("unrecognised block starting '{content}'"));
            file.unknown_blocks.push(verbatim(&lines, block_start, end));
            i = end;
        }
    }

    TableFileOutcome::Table(file)
}

fn verbatim(lines: &[&str], start: usize, end: usize) -> String {
    let mut text = lines[start..end].join("\n");
    text.push('\n');
    text
}

fn parse_column_block(
    lines: &[&str],
    block_start: usize,
    header: usize,
    end: usize,
    header_rest: &str,
) -> Result<ParsedColumn, String> {
    let display_name = unquote(header_rest.trim());
    if display_name.is_empty() {
        return Err("column block with empty name".to_string());
    }

    let mut column = ParsedColumn {
        display_name,
        verbatim: verbatim(lines, block_start, end),
        ..Default::default()
    };

    for line in &lines[block_start..header] {
        if let Some(text) = trivia_text(line) {
            if column.logical_name.is_none() && is_logical_name_marker(text) {
                column.logical_name = Some(text.to_string());
            } else {
                column.description.push(text.to_string());
            }
        }
    }

    for line in &lines[header + 1..end] {
        if is_blank(line) {
            continue;
        }
        let content = line.trim_start();
        if let Some(rest) = content.strip_prefix("annotation ") {
            column.annotations.push(rest.trim().to_string());
            continue;
        }
        match content {
            "isHidden" => {
                column.is_hidden = true;
                continue;
            }
            "isKey" => {
                column.is_key = true;
                continue;
            }
            "isDefaultLabel" => {
                column.is_default_label = true;
                continue;
            }
            _ => {}
        }
        if let Some((name, value)) = split_property(content) {
            let value = value.to_string();
            match name {
                "dataType" => column.data_type = Some(value),
                "sourceColumn" => column.source_column = Some(unquote(&value)),
                "formatString" => column.format_string = Some(value),
                "summarizeBy" => column.summarize_by = Some(value),
                "sourceProviderType" => column.source_provider_type = Some(value),
                "lineageTag" => column.lineage_tag = Some(value),
                "isHidden" => column.is_hidden = value.eq_ignore_ascii_case("true"),
                "isKey" => column.is_key = value.eq_ignore_ascii_case("true"),
                "isDefaultLabel" => {
                    column.is_default_label = value.eq_ignore_ascii_case("true")
                }
                _ => {}
            }
        }
    }

    if column.data_type.is_none() {
        return Err(format!(
            "column '{}' has no dataType property",
            column.display_name
        ));
    }
    Ok(column)
}

fn parse_measure_block(
    lines: &[&str],
    block_start: usize,
    header: usize,
    end: usize,
    header_rest: &str,
) -> Result<ParsedMeasure, String> {
    let name = measure_name(header_rest)
        .ok_or_else(|| format!("measure header without name: '{header_rest}'"))?;

    let mut lineage_tag = None;
    for line in &lines[header + 1..end] {
        if let Some((prop, value)) = split_property(line.trim_start()) {
            if prop == "lineageTag" {
                lineage_tag = Some(value.to_string());
            }
        }
    }

    Ok(ParsedMeasure {
        name,
        lineage_tag,
        verbatim: verbatim(lines, block_start, end),
    })
}

/// Extract the name from `measure <name> = <expr>`, where the name may be
/// quoted and contain `=` or doubled quotes.
fn measure_name(rest: &str) -> Option<String> {
    let rest = rest.trim_start();
    if let Some(tail) = rest.strip_prefix('\'') {
        // Scan for the closing quote, honouring '' escapes.
        let bytes = tail.as_bytes();
        let mut i = 0;
        while i < bytes.len() {
            if bytes[i] == b'\'' {
                if bytes.get(i + 1) == Some(&b'\'') {
                    i += 2;
                    continue;
                }
                let name = tail[..i].replace("''", "'");
                return (!name.is_empty()).then_some(name);
            }
            i += 1;
        }
        None
    } else {
        let name = rest.split('=').next()?.trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}

/// The partition body is everything owned by its `source =` line, plus the
/// inline remainder when the expression is on the same line.
fn extract_partition_body(lines: &[&str], start: usize, end: usize) -> Option<String> {
    for (offset, line) in lines[start..end].iter().enumerate() {
        let content = line.trim_start();
        if let Some(rest) = content.strip_prefix("source") {
            let rest = rest.trim_start();
            if let Some(inline) = rest.strip_prefix('=') {
                let idx = start + offset;
                let body_end = block_end(&lines[..end], idx);
                let mut body = String::new();
                if !inline.trim().is_empty() {
                    body.push_str(inline.trim());
                    body.push('\n');
                }
                for line in &lines[idx + 1..body_end] {
                    body.push_str(line);
                    body.push('\n');
                }
                return Some(body);
            }
        }
    }
    None
}
