//! Semantic comparison of the freshly computed model against the on-disk
//! prior state.

pub mod query_norm;
pub mod report;
pub mod types;

use std::collections::HashMap;

use crate::emit::plan::ColumnPlan;
use crate::emit::query::partition_source_expr;
use crate::emit::relationships::PlannedRelationship;
use crate::merge::{auto_measure_names, match_existing, translated_canon, PreservationPlan};
use crate::model::{BuildRequest, TableRole, TableSpec};
use crate::parse::{ExistingModel, ExistingTable, ParsedColumn};
use crate::util::{contains_ci, eq_ci, strip_url_scheme};

pub use query_norm::{normalize_query, queries_equal};
pub use types::{ChangeEntry, ChangeKind, ChangeSet, Impact};

/// Compute the change set for one build.
///
/// The expected side is the post-merge output (user metadata carried over),
/// so re-analysing an applied build reports only preservation.
pub fn compute_change_set(
    request: &BuildRequest,
    plans_by_table: &HashMap<String, Vec<ColumnPlan>>,
    planned_relationships: &[PlannedRelationship],
    preservation: &PreservationPlan,
    existing: &ExistingModel,
) -> ChangeSet {
    let mut change_set = ChangeSet::default();

    // Connection-mode switch invalidates every partition at once.
    let mode_changed = match existing_mode_is_fabric(existing) {
        Some(existing_fabric) => existing_fabric != request.connection_mode.is_fabric(),
        None => false,
    };
    if mode_changed {
        change_set.push(
            ChangeEntry::new(
                Impact::Destructive,
                ChangeKind::ConnectionModeChanged,
                "connection mode",
            )
            .with_detail("connection mode change invalidates every partition"),
        );
    }

    let expected_tuples: Vec<String> = planned_relationships
        .iter()
        .map(|r| r.tuple.canon())
        .collect();
    let rename_map: HashMap<String, String> = preservation
        .renames
        .iter()
        .map(|r| (r.old_display_name.to_lowercase(), r.new_display_name.clone()))
        .collect();
    // Existing-only relationships are the user-preserved set; a column they
    // reference must not silently disappear.
    let preserved_refs: Vec<(String, String)> = existing
        .relationships
        .relationships
        .iter()
        .filter(|r| !expected_tuples.contains(&translated_canon(r, &rename_map)))
        .flat_map(|r| {
            [
                (r.from_table.clone(), r.from_column.clone()),
                (r.to_table.clone(), r.to_column.clone()),
            ]
        })
        .collect();

    for table in &request.tables {
        let plans = plans_by_table
            .get(&table.logical_name.to_lowercase())
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        match match_existing(existing, table) {
            None => {
                change_set.push(
                    ChangeEntry::new(Impact::Additive, ChangeKind::NewTable, &table.display_name)
                        .for_table(&table.display_name),
                );
            }
            Some(existing_table) => diff_table(
                &mut change_set,
                request,
                table,
                plans,
                existing_table,
                preservation,
                &preserved_refs,
            ),
        }
    }

    diff_relationships(&mut change_set, planned_relationships, existing, &rename_map);
    diff_url(&mut change_set, request, existing);

    for warning in &existing.warnings {
        change_set.push(
            ChangeEntry::new(Impact::Safe, ChangeKind::Warning, "parse").with_detail(warning),
        );
    }

    change_set
}

/// Whether the prior emission used FabricLink, judged from partition text.
fn existing_mode_is_fabric(existing: &ExistingModel) -> Option<bool> {
    for table in &existing.tables {
        if table.parsed.is_date_table {
            continue;
        }
        if let Some(body) = &table.parsed.partition_body {
            if contains_ci(body, "CommonDataService.Database") {
                return Some(false);
            }
            if contains_ci(body, "Sql.Database(") {
                return Some(true);
            }
        }
    }
    None
}

#[allow(clippy::too_many_arguments)]
fn diff_table(
    change_set: &mut ChangeSet,
    request: &BuildRequest,
    table: &TableSpec,
    plans: &[ColumnPlan],
    existing_table: &ExistingTable,
    preservation: &PreservationPlan,
    preserved_refs: &[(String, String)],
) {
    let display = table.display_name.as_str();
    let parsed = &existing_table.parsed;
    let before = change_set.entries.len();

    if !eq_ci(&parsed.display_name, display) {
        change_set.push(
            ChangeEntry::new(Impact::Moderate, ChangeKind::TableRenamed, display)
                .for_table(display)
                .with_detail(format!("renamed from '{}'", parsed.display_name)),
        );
    }

    // Columns, matched by display name.
    for plan in plans {
        let matched = parsed
            .columns
            .iter()
            .find(|c| eq_ci(&c.display_name, &plan.display_name));
        match matched {
            None => {
                change_set.push(
                    ChangeEntry::new(Impact::Additive, ChangeKind::NewColumn, &plan.display_name)
                        .for_table(display),
                );
            }
            Some(column) => {
                if let Some(detail) = modified_detail(table, plan, column, preservation) {
                    change_set.push(
                        ChangeEntry::new(
                            Impact::Moderate,
                            ChangeKind::ModifiedColumn,
                            &plan.display_name,
                        )
                        .for_table(display)
                        .with_detail(detail),
                    );
                }
            }
        }
    }
    for column in &parsed.columns {
        // Blocks without the logical-name marker are user-added and kept.
        if column.logical_name.is_none() {
            continue;
        }
        let still_expected = plans
            .iter()
            .any(|p| eq_ci(&p.display_name, &column.display_name));
        if !still_expected {
            let referenced = preserved_refs.iter().any(|(t, c)| {
                eq_ci(t, &parsed.display_name) && eq_ci(c, &column.display_name)
            });
            let impact = if referenced {
                Impact::Destructive
            } else {
                Impact::Moderate
            };
            let mut entry =
                ChangeEntry::new(impact, ChangeKind::RemovedColumn, &column.display_name)
                    .for_table(display);
            if referenced {
                entry = entry.with_detail("referenced by a preserved relationship");
            }
            change_set.push(entry);
        }
    }

    // Partition query.
    if let Some(body) = &parsed.partition_body {
        let expected = format!(
            "let Source = {} in Source",
            partition_source_expr(table, plans, request)
        );
        if !queries_equal(body, &expected) {
            change_set.push(
                ChangeEntry::new(Impact::Moderate, ChangeKind::QueryChanged, display)
                    .for_table(display)
                    .with_detail("partition query differs"),
            );
        }
    }

    // A role change that drops the link measure invalidates it.
    let (_, old_link) = auto_measure_names(&parsed.display_name);
    let had_link = parsed
        .measures
        .iter()
        .any(|m| eq_ci(&m.name, &old_link));
    if had_link && table.role == TableRole::Dimension {
        change_set.push(
            ChangeEntry::new(Impact::Destructive, ChangeKind::RoleChanged, display)
                .for_table(display)
                .with_detail(format!("'{old_link}' is removed by the role change")),
        );
    }

    let changed = change_set.entries.len() > before;
    if !changed {
        change_set.push(
            ChangeEntry::new(Impact::Safe, ChangeKind::PreserveTable, display)
                .for_table(display)
                .with_detail("No changes detected"),
        );
    }

    // User measures are surfaced even when the table otherwise changed.
    let (new_count, new_link) = auto_measure_names(display);
    let (old_count, old_link) = auto_measure_names(&parsed.display_name);
    for measure in &parsed.measures {
        let auto = [&new_count, &new_link, &old_count, &old_link]
            .iter()
            .any(|name| eq_ci(&measure.name, name));
        if !auto {
            change_set.push(
                ChangeEntry::new(Impact::Safe, ChangeKind::PreserveMeasure, &measure.name)
                    .for_table(display),
            );
        }
    }
}

/// Detail string for a modified column, or `None` when unchanged. The
/// expected side honours carried-over user metadata so that user edits are
/// not re-reported forever.
fn modified_detail(
    table: &TableSpec,
    plan: &ColumnPlan,
    column: &ParsedColumn,
    preservation: &PreservationPlan,
) -> Option<String> {
    let mut changed: Vec<String> = Vec::new();

    let parsed_type = column.data_type.as_deref().unwrap_or_default();
    if !eq_ci(parsed_type, plan.type_info.data_type) {
        changed.push(format!(
            "dataType {parsed_type} -> {}",
            plan.type_info.data_type
        ));
    }

    // Matching is case-insensitive, but the rendered name is not; a
    // case-only rename still has to surface.
    if column.display_name != plan.display_name {
        changed.push(format!(
            "displayName '{}' -> '{}'",
            column.display_name, plan.display_name
        ));
    }

    let carry = preservation
        .table_carry(&table.logical_name)
        .and_then(|c| c.columns.get(&plan.display_name.to_lowercase()));
    let expected_format = carry
        .and_then(|c| c.format_string.as_deref())
        .or(plan.type_info.format_string)
        .unwrap_or("");
    let parsed_format = column.format_string.as_deref().unwrap_or("");
    // Empty and absent format strings are the same thing.
    if !eq_ci(parsed_format, expected_format) {
        changed.push(format!(
            "formatString '{parsed_format}' -> '{expected_format}'"
        ));
    }

    (!changed.is_empty()).then(|| changed.join(", "))
}

fn diff_relationships(
    change_set: &mut ChangeSet,
    planned: &[PlannedRelationship],
    existing: &ExistingModel,
    rename_map: &HashMap<String, String>,
) {
    let existing_tuples: Vec<String> = existing
        .relationships
        .relationships
        .iter()
        .map(|r| translated_canon(r, rename_map))
        .collect();
    let expected_tuples: Vec<String> = planned.iter().map(|r| r.tuple.canon()).collect();
    let before = change_set.entries.len();

    for relationship in planned {
        if !existing_tuples.contains(&relationship.tuple.canon()) {
            change_set.push(
                ChangeEntry::new(
                    Impact::Additive,
                    ChangeKind::NewRelationship,
                    format!(
                        "{}.{} -> {}.{}",
                        relationship.tuple.from_table,
                        relationship.tuple.from_column,
                        relationship.tuple.to_table,
                        relationship.tuple.to_column
                    ),
                ),
            );
        }
    }
    for relationship in &existing.relationships.relationships {
        if expected_tuples.contains(&translated_canon(relationship, rename_map)) {
            continue;
        }
        let subject = format!(
            "{}.{} -> {}.{}",
            relationship.from_table,
            relationship.from_column,
            relationship.to_table,
            relationship.to_column
        );
        if relationship.user_marked {
            change_set.push(ChangeEntry::new(
                Impact::Safe,
                ChangeKind::PreserveRelationship,
                subject,
            ));
        } else {
            // Reported once; the merge keeps the block and marks it.
            change_set.push(
                ChangeEntry::new(Impact::Moderate, ChangeKind::RemovedRelationship, subject)
                    .with_detail("kept on disk as a user-added relationship"),
            );
        }
    }

    if change_set.entries.len() == before && !existing.relationships.relationships.is_empty() {
        change_set.push(
            ChangeEntry::new(Impact::Safe, ChangeKind::PreserveRelationship, "relationships")
                .with_detail("No changes detected"),
        );
    }
}

fn diff_url(change_set: &mut ChangeSet, request: &BuildRequest, existing: &ExistingModel) {
    let Some(existing_url) = existing.expression_value("DataverseURL") else {
        return;
    };
    let requested = strip_url_scheme(&request.dataverse_url);
    if eq_ci(strip_url_scheme(existing_url), requested) {
        change_set.push(
            ChangeEntry::new(Impact::Safe, ChangeKind::PreserveUrl, "DataverseURL")
                .with_detail("No changes detected"),
        );
    } else {
        change_set.push(
            ChangeEntry::new(Impact::Moderate, ChangeKind::UrlChanged, "DataverseURL")
                .with_detail(format!("'{existing_url}' -> '{requested}'")),
        );
    }
}
