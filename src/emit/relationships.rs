//! `relationships.tmdl` emission.

use std::collections::HashMap;

use crate::merge::RelationshipCarry;
use crate::model::BuildRequest;
use crate::util::fresh_guid;

use super::plan::{visible_plan_for, ColumnPlan};
use super::quote::quote;

/// Endpoint tuple of a relationship, in display-level names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelTuple {
    pub from_table: String,
    pub from_column: String,
    pub to_table: String,
    pub to_column: String,
}

impl RelTuple {
    /// Case-insensitive canonical key used for matching and preservation.
    pub fn canon(&self) -> String {
        format!(
            "{}.{}->{}.{}",
            self.from_table, self.from_column, self.to_table, self.to_column
        )
        .to_lowercase()
    }
}

/// One relationship the model should contain.
#[derive(Debug, Clone)]
pub struct PlannedRelationship {
    pub tuple: RelTuple,
    pub is_active: bool,
    pub rely_on_referential_integrity: bool,
}

/// Order the emitted relationships: fact→dimension in declared order, then
/// snowflake, then the implicit Date relationship.
pub fn plan_relationships(
    request: &BuildRequest,
    plans_by_table: &HashMap<String, Vec<ColumnPlan>>,
) -> Vec<PlannedRelationship> {
    let mut planned = Vec::new();

    let push_user = |snowflake_pass: bool, planned: &mut Vec<PlannedRelationship>| {
        for rel in request
            .relationships
            .iter()
            .filter(|r| r.is_snowflake == snowflake_pass)
        {
            let Some(source) = request.table_by_logical(&rel.source_table) else {
                continue;
            };
            let Some(target) = request.table_by_logical(&rel.target_table) else {
                continue;
            };
            planned.push(PlannedRelationship {
                tuple: RelTuple {
                    from_table: source.display_name.clone(),
                    from_column: rel.source_attribute.clone(),
                    to_table: target.display_name.clone(),
                    to_column: target.primary_id_attribute.clone(),
                },
                is_active: rel.is_active,
                rely_on_referential_integrity: rel.is_snowflake
                    || rel.assume_referential_integrity,
            });
        }
    };
    push_user(false, &mut planned);
    push_user(true, &mut planned);

    if let Some(date_config) = &request.date_config {
        if let Some(host) = request.table_by_logical(&date_config.primary_date_table) {
            let field_display = plans_by_table
                .get(&host.logical_name.to_lowercase())
                .and_then(|plans| visible_plan_for(plans, &date_config.primary_date_field))
                .map(|p| p.display_name.clone())
                .unwrap_or_else(|| date_config.primary_date_field.clone());
            planned.push(PlannedRelationship {
                tuple: RelTuple {
                    from_table: host.display_name.clone(),
                    from_column: field_display,
                    to_table: "Date".to_string(),
                    to_column: "Date".to_string(),
                },
                is_active: true,
                rely_on_referential_integrity: false,
            });
        }
    }

    planned
}

/// Render the relationships file, LF-internal. Matched relationships keep
/// their prior GUID; user-added blocks are re-emitted verbatim at the end.
pub fn emit_relationships_file(
    planned: &[PlannedRelationship],
    carry: &RelationshipCarry,
) -> String {
    let mut out = String::new();

    for relationship in planned {
        if !out.is_empty() {
            out.push('\n');
        }
        let guid = carry
            .guid_by_tuple
            .get(&relationship.tuple.canon())
            .cloned()
            .unwrap_or_else(fresh_guid);
        out.push_str(&format!("relationship {guid}\n"));
        if relationship.rely_on_referential_integrity {
            out.push_str("\trelyOnReferentialIntegrity\n");
        }
        if !relationship.is_active {
            out.push_str("\tisActive: false\n");
        }
        out.push_str(&format!(
            "\tfromColumn: {}.{}\n",
            quote(&relationship.tuple.from_table),
            quote(&relationship.tuple.from_column)
        ));
        out.push_str(&format!(
            "\ttoColumn: {}.{}\n",
            quote(&relationship.tuple.to_table),
            quote(&relationship.tuple.to_column)
        ));
    }

    for block in carry.user_blocks.iter().chain(&carry.unknown_blocks) {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(block);
    }

    out
}
