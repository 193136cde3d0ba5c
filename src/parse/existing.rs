//! Reads the prior on-disk model state into memory for diffing and merging.

use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::error::PbipGenError;
use crate::util::strip_bom;

use super::expressions_file::parse_expressions_file;
use super::relationships_file::{parse_relationships_file, ParsedRelationships};
use super::table_file::{parse_table_file, ParsedTableFile, TableFileOutcome};
use super::ParsedExpression;

/// One table file found under `definition/tables/`.
#[derive(Debug)]
pub struct ExistingTable {
    pub path: PathBuf,
    pub file_stem: String,
    pub parsed: ParsedTableFile,
}

/// Everything the differ and merger need from the prior emission.
#[derive(Debug, Default)]
pub struct ExistingModel {
    pub tables: Vec<ExistingTable>,
    pub date_table_present: bool,
    pub relationships: ParsedRelationships,
    pub expressions: Vec<ParsedExpression>,
    /// Files under `tables/` that are not this tool's output.
    pub foreign_files: Vec<PathBuf>,
    pub warnings: Vec<String>,
}

impl ExistingModel {
    pub fn table_by_source<'a>(&'a self, logical_name: &str) -> Option<&'a ExistingTable> {
        self.tables.iter().find(|t| {
            t.parsed
                .source_logical_name
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(logical_name))
        })
    }

    pub fn expression_value(&self, name: &str) -> Option<&str> {
        self.expressions
            .iter()
            .find(|e| e.name.eq_ignore_ascii_case(name))
            .and_then(|e| e.value.as_deref())
    }
}

/// Read the existing semantic-model definition, if any.
///
/// A missing definition directory yields an empty model (first build). Table
/// files that fail to read abort; files that fail to *parse* degrade to
/// foreign with a warning.
pub fn read_existing_model(definition_dir: &Path) -> Result<ExistingModel> {
    let mut model = ExistingModel::default();
    if !definition_dir.exists() {
        return Ok(model);
    }

    let tables_dir = definition_dir.join("tables");
    if tables_dir.exists() {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(&tables_dir)
            .map_err(|e| PbipGenError::ModelReadError {
                path: tables_dir.clone(),
                source: e,
            })?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().is_some_and(|ext| ext == "tmdl"))
            .collect();
        entries.sort();

        for path in entries {
            let text = read_text(&path)?;
            match parse_table_file(&text) {
                TableFileOutcome::Table(parsed) => {
                    for warning in &parsed.warnings {
                        model.warnings.push(format!("{}: {warning}", path.display()));
                    }
                    if parsed.is_date_table {
                        model.date_table_present = true;
                    }
                    let file_stem = path
                        .file_stem()
                        .and_then(|s| s.to_str())
                        .unwrap_or_default()
                        .to_string();
                    model.tables.push(ExistingTable {
                        path,
                        file_stem,
                        parsed,
                    });
                }
                TableFileOutcome::Foreign => {
                    model
                        .warnings
                        .push(format!("{}: not a generated table file", path.display()));
                    model.foreign_files.push(path);
                }
            }
        }
    }

    let relationships_path = definition_dir.join("relationships.tmdl");
    if relationships_path.exists() {
        let text = read_text(&relationships_path)?;
        model.relationships = parse_relationships_file(&text);
        for warning in &model.relationships.warnings {
            model
                .warnings
                .push(format!("{}: {warning}", relationships_path.display()));
        }
    }

    let expressions_path = definition_dir.join("expressions.tmdl");
    if expressions_path.exists() {
        let text = read_text(&expressions_path)?;
        model.expressions = parse_expressions_file(&text);
    }

    Ok(model)
}

fn read_text(path: &Path) -> Result<String> {
    let raw = std::fs::read_to_string(path).map_err(|e| PbipGenError::ModelReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(strip_bom(&raw).to_string())
}
