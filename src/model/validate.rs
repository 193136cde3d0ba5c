//! Request invariant checks, run before any filesystem mutation.

use std::collections::{HashMap, HashSet};

use crate::error::PbipGenError;

use super::BuildRequest;

/// Validate the request invariants. Any violation aborts the build before a
/// single byte is written.
pub fn validate_request(request: &BuildRequest) -> Result<(), PbipGenError> {
    if request.project_name.trim().is_empty() {
        return Err(PbipGenError::invariant("project name is empty"));
    }

    let mut display_names: HashSet<String> = HashSet::new();
    for table in &request.tables {
        if table.primary_id_attribute.trim().is_empty() {
            return Err(PbipGenError::invariant(format!(
                "table '{}' has no primary key attribute",
                table.logical_name
            )));
        }
        if !display_names.insert(table.display_name.to_lowercase()) {
            return Err(PbipGenError::invariant(format!(
                "duplicate table display name '{}'",
                table.display_name
            )));
        }
    }

    for rel in &request.relationships {
        let source = request.table_by_logical(&rel.source_table).ok_or_else(|| {
            PbipGenError::invariant(format!(
                "relationship source table '{}' is not part of the model",
                rel.source_table
            ))
        })?;
        if request.table_by_logical(&rel.target_table).is_none() {
            return Err(PbipGenError::invariant(format!(
                "relationship target table '{}' is not part of the model",
                rel.target_table
            )));
        }
        let declared = source.attribute(&rel.source_attribute).is_some();
        let required = source
            .required_lookup_columns
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&rel.source_attribute));
        if !declared && !required {
            return Err(PbipGenError::invariant(format!(
                "relationship column '{}.{}' is neither a declared attribute nor a required lookup column",
                rel.source_table, rel.source_attribute
            )));
        }
    }

    // At most one active relationship per ordered (source, target) pair.
    let mut active_pairs: HashMap<(String, String), usize> = HashMap::new();
    for rel in request.relationships.iter().filter(|r| r.is_active) {
        let key = (
            rel.source_table.to_lowercase(),
            rel.target_table.to_lowercase(),
        );
        let count = active_pairs.entry(key).or_insert(0);
        *count += 1;
        if *count > 1 {
            return Err(PbipGenError::invariant(format!(
                "more than one active relationship between '{}' and '{}'",
                rel.source_table, rel.target_table
            )));
        }
    }

    if let Some(date_config) = &request.date_config {
        if request
            .table_by_logical(&date_config.primary_date_table)
            .is_none()
        {
            return Err(PbipGenError::invariant(format!(
                "date table host '{}' is not part of the model",
                date_config.primary_date_table
            )));
        }
        if date_config.start_year > date_config.end_year {
            return Err(PbipGenError::invariant(format!(
                "calendar range {}..{} is inverted",
                date_config.start_year, date_config.end_year
            )));
        }
    }

    Ok(())
}
