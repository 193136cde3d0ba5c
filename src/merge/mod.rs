//! Preservation planning for incremental updates.
//!
//! Before re-emitting, the prior on-disk state is distilled into carry-over
//! structures: lineage tags keyed by entity identity, user-authored measure
//! and column blocks kept verbatim, user-added relationships, and per-column
//! metadata edits. Emitters consult these so that regeneration never
//! invalidates published reports or destroys user content. Blocks that
//! failed to parse are carried verbatim rather than dropped.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::emit::plan::ColumnPlan;
use crate::emit::relationships::PlannedRelationship;
use crate::model::{BuildRequest, TableSpec};
use crate::parse::{ExistingModel, ParsedColumn, ParsedTableFile};
use crate::util::sanitize_file_name;

/// Annotations the generator owns; everything else on a column is the
/// user's and is carried over.
const MANAGED_ANNOTATIONS: &[&str] = &["SummarizationSetBy", "UnderlyingDateTimeDataType"];

/// Per-column carry-over.
#[derive(Debug, Clone, Default)]
pub struct ColumnCarry {
    pub lineage_tag: Option<String>,
    /// User-edited description trivia lines.
    pub description: Vec<String>,
    pub format_string: Option<String>,
    pub summarize_by: Option<String>,
    /// Annotation payloads other than the managed set.
    pub annotations: Vec<String>,
}

/// Per-table carry-over.
#[derive(Debug, Clone, Default)]
pub struct TableCarry {
    pub table_lineage_tag: Option<String>,
    /// Keyed by lowercase column display name.
    pub columns: HashMap<String, ColumnCarry>,
    /// Lineage tags of the two auto-generated measures, keyed `"count"` /
    /// `"link"` so they survive a table rename.
    pub auto_measure_tags: HashMap<&'static str, String>,
    /// User measures, verbatim, in file order.
    pub user_measures: Vec<String>,
    /// User-added columns (no logical-name marker, no expected match),
    /// verbatim.
    pub user_columns: Vec<String>,
    /// Unparseable blocks, carried verbatim.
    pub unknown_blocks: Vec<String>,
}

/// Relationships carry-over.
#[derive(Debug, Clone, Default)]
pub struct RelationshipCarry {
    /// Canonical tuple → existing GUID.
    pub guid_by_tuple: HashMap<String, String>,
    /// User-added relationship blocks, verbatim.
    pub user_blocks: Vec<String>,
    pub unknown_blocks: Vec<String>,
}

/// A table file that must move because its display name changed.
#[derive(Debug, Clone)]
pub struct RenameMove {
    pub logical_name: String,
    pub old_path: PathBuf,
    pub old_display_name: String,
    pub new_display_name: String,
}

/// Everything the writer carries from the previous emission.
#[derive(Debug, Default)]
pub struct PreservationPlan {
    /// Keyed by lowercase table logical name.
    pub tables: HashMap<String, TableCarry>,
    pub relationships: RelationshipCarry,
    /// Expression name → lineage tag.
    pub expression_tags: HashMap<String, String>,
    pub renames: Vec<RenameMove>,
}

impl PreservationPlan {
    pub fn table_carry(&self, logical_name: &str) -> Option<&TableCarry> {
        self.tables.get(&logical_name.to_lowercase())
    }
}

/// The two auto-generated measure names for a table display name.
pub fn auto_measure_names(display_name: &str) -> (String, String) {
    (
        format!("{display_name} Count"),
        format!("Link to {display_name}"),
    )
}

/// Build the preservation plan for this request against the prior state.
pub fn plan_preservation(
    request: &BuildRequest,
    plans_by_table: &HashMap<String, Vec<ColumnPlan>>,
    planned_relationships: &[PlannedRelationship],
    existing: &ExistingModel,
) -> PreservationPlan {
    let mut plan = PreservationPlan::default();

    for table in &request.tables {
        let Some(existing_table) = match_existing(existing, table) else {
            continue;
        };
        let plans = plans_by_table
            .get(&table.logical_name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let carry = table_carry(table, plans, &existing_table.parsed);
        plan.tables.insert(table.logical_name.to_lowercase(), carry);

        let new_stem = sanitize_file_name(&table.display_name);
        if existing_table.file_stem != new_stem {
            plan.renames.push(RenameMove {
                logical_name: table.logical_name.clone(),
                old_path: existing_table.path.clone(),
                old_display_name: existing_table.parsed.display_name.clone(),
                new_display_name: table.display_name.clone(),
            });
        }
    }

    let expected: Vec<String> = planned_relationships
        .iter()
        .map(|r| r.tuple.canon())
        .collect();
    // Renamed tables: existing tuples still carry the old display name.
    let rename_map: HashMap<String, String> = plan
        .renames
        .iter()
        .map(|r| (r.old_display_name.to_lowercase(), r.new_display_name.clone()))
        .collect();
    for relationship in &existing.relationships.relationships {
        let canon = translated_canon(relationship, &rename_map);
        if expected.contains(&canon) {
            plan.relationships
                .guid_by_tuple
                .insert(canon, relationship.guid.clone());
        } else {
            let mut block = String::new();
            if !relationship.verbatim.starts_with("///") {
                block.push_str("/// User-added relationship\n");
            }
            block.push_str(&relationship.verbatim);
            plan.relationships.user_blocks.push(block);
        }
    }
    plan.relationships.unknown_blocks = existing.relationships.unknown_blocks.clone();

    for expression in &existing.expressions {
        if let Some(tag) = &expression.lineage_tag {
            plan.expression_tags
                .insert(expression.name.clone(), tag.clone());
        }
    }

    plan
}

/// Canonical tuple of an existing relationship with renamed table display
/// names applied, so a rename does not orphan its relationships.
pub fn translated_canon(
    relationship: &crate::parse::ParsedRelationship,
    rename_map: &HashMap<String, String>,
) -> String {
    let translate = |name: &str| -> String {
        rename_map
            .get(&name.to_lowercase())
            .cloned()
            .unwrap_or_else(|| name.to_string())
    };
    format!(
        "{}.{}->{}.{}",
        translate(&relationship.from_table),
        relationship.from_column,
        translate(&relationship.to_table),
        relationship.to_column
    )
    .to_lowercase()
}

/// Match a request table to a prior file: by `Source:` marker first, by
/// display name as a fallback for files written before the marker existed.
pub fn match_existing<'a>(
    existing: &'a ExistingModel,
    table: &TableSpec,
) -> Option<&'a crate::parse::ExistingTable> {
    existing.table_by_source(&table.logical_name).or_else(|| {
        existing.tables.iter().find(|t| {
            t.parsed.source_logical_name.is_none()
                && t.parsed
                    .display_name
                    .eq_ignore_ascii_case(&table.display_name)
        })
    })
}

fn table_carry(table: &TableSpec, plans: &[ColumnPlan], parsed: &ParsedTableFile) -> TableCarry {
    let mut carry = TableCarry {
        table_lineage_tag: parsed.lineage_tag.clone(),
        unknown_blocks: parsed.unknown_blocks.clone(),
        ..Default::default()
    };

    for column in &parsed.columns {
        let expected = plans
            .iter()
            .find(|p| p.display_name.eq_ignore_ascii_case(&column.display_name));
        match expected {
            Some(plan) => {
                let key = column.display_name.to_lowercase();
                carry.columns.insert(key, column_carry(plan, column));
            }
            None if column.logical_name.is_some() => {
                // Dropped from the request; nothing carried.
            }
            None => carry.user_columns.push(column.verbatim.clone()),
        }
    }

    let (old_count, old_link) = auto_measure_names(&parsed.display_name);
    let (new_count, new_link) = auto_measure_names(&table.display_name);
    for measure in &parsed.measures {
        let kind = if measure.name.eq_ignore_ascii_case(&old_count)
            || measure.name.eq_ignore_ascii_case(&new_count)
        {
            Some("count")
        } else if measure.name.eq_ignore_ascii_case(&old_link)
            || measure.name.eq_ignore_ascii_case(&new_link)
        {
            Some("link")
        } else {
            None
        };
        match kind {
            Some(kind) => {
                if let Some(tag) = &measure.lineage_tag {
                    carry.auto_measure_tags.insert(
                        if kind == "count" { "count" } else { "link" },
                        tag.clone(),
                    );
                }
            }
            None => carry.user_measures.push(measure.verbatim.clone()),
        }
    }

    carry
}

/// Carry-over for one matched column. The lineage tag always survives;
/// user-visible metadata survives only when the data type is unchanged.
fn column_carry(plan: &ColumnPlan, column: &ParsedColumn) -> ColumnCarry {
    let mut carry = ColumnCarry {
        lineage_tag: column.lineage_tag.clone(),
        ..Default::default()
    };
    let type_matches = column
        .data_type
        .as_deref()
        .is_some_and(|t| t.eq_ignore_ascii_case(plan.type_info.data_type));
    if type_matches {
        carry.description = column.description.clone();
        carry.format_string = column.format_string.clone();
        carry.summarize_by = column.summarize_by.clone();
        carry.annotations = column
            .annotations
            .iter()
            .filter(|a| {
                let name = a.split('=').next().unwrap_or("").trim();
                !MANAGED_ANNOTATIONS.iter().any(|m| name.eq_ignore_ascii_case(m))
            })
            .cloned()
            .collect();
    }
    carry
}
