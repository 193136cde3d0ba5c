//! Column planning: one ordered pass per table that both the query emitter
//! and the column emitter consume, so the select list and the column blocks
//! can never drift apart.

use crate::model::{AttributeType, DateTableConfig, TableSpec};

use super::type_map::{map_attribute_type, TypeInfo};

/// Which lakehouse metadata table resolves a choice label under FabricLink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataTable {
    Optionset,
    GlobalOptionset,
    Status,
}

impl MetadataTable {
    pub fn table_name(self) -> &'static str {
        match self {
            MetadataTable::Optionset => "OptionsetMetadata",
            MetadataTable::GlobalOptionset => "GlobalOptionsetMetadata",
            MetadataTable::Status => "StatusMetadata",
        }
    }

    pub fn value_column(self) -> &'static str {
        match self {
            MetadataTable::Optionset | MetadataTable::GlobalOptionset => "Option",
            MetadataTable::Status => "Status",
        }
    }
}

/// Shape of one planned column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Primary key: hidden, `isKey`, first in the select list.
    Key,
    /// Lookup id demanded by a relationship but not user-selected.
    RequiredLookup,
    /// Hidden id half of a lookup attribute.
    LookupId,
    /// Visible name half of a lookup attribute.
    LookupName,
    /// Single visible label column of a choice/boolean attribute.
    ChoiceName { metadata: MetadataTable },
    /// DateTime projected to date-only with a timezone-adjusted CAST.
    WrappedDate,
    Plain,
}

/// One column of a table, in emission order.
#[derive(Debug, Clone)]
pub struct ColumnPlan {
    /// Source attribute logical name; written as `///` trivia so updates can
    /// recover the origin of each generated block.
    pub logical_name: String,
    /// TMDL column name.
    pub display_name: String,
    /// SQL result column backing this TMDL column.
    pub source_column: String,
    pub kind: ColumnKind,
    pub type_info: TypeInfo,
    pub is_hidden: bool,
    pub is_key: bool,
    pub is_default_label: bool,
    pub description: Option<String>,
}

/// Build the ordered column plan for one table.
///
/// Order is normative: primary key, required lookup ids, then declared
/// attributes (lookups expanding to id + name, choices collapsing to their
/// label column), skipping columns already emitted and `statecode`.
pub fn plan_columns(table: &TableSpec, date_config: Option<&DateTableConfig>) -> Vec<ColumnPlan> {
    let mut plans: Vec<ColumnPlan> = Vec::new();
    let mut emitted: Vec<String> = Vec::new();

    let already_emitted = |emitted: &mut Vec<String>, column: &str| -> bool {
        if emitted.iter().any(|c| c.eq_ignore_ascii_case(column)) {
            true
        } else {
            emitted.push(column.to_string());
            false
        }
    };

    // Primary key, always first and always a hidden key column.
    let pk = table.primary_id_attribute.as_str();
    already_emitted(&mut emitted, pk);
    plans.push(ColumnPlan {
        logical_name: pk.to_string(),
        display_name: pk.to_string(),
        source_column: pk.to_string(),
        kind: ColumnKind::Key,
        type_info: map_attribute_type(AttributeType::UniqueIdentifier),
        is_hidden: true,
        is_key: true,
        is_default_label: false,
        description: None,
    });

    // Relationship-required lookup ids not covered by the selection.
    for required in &table.required_lookup_columns {
        if already_emitted(&mut emitted, required) {
            continue;
        }
        plans.push(ColumnPlan {
            logical_name: required.clone(),
            display_name: required.clone(),
            source_column: required.clone(),
            kind: ColumnKind::RequiredLookup,
            type_info: map_attribute_type(AttributeType::Lookup),
            is_hidden: true,
            is_key: false,
            is_default_label: false,
            description: None,
        });
    }

    // Declared attributes in order.
    for attr in &table.attributes {
        if attr.logical_name.eq_ignore_ascii_case("statecode") {
            continue;
        }
        let is_primary_name = table
            .primary_name_attribute
            .as_deref()
            .is_some_and(|n| n.eq_ignore_ascii_case(&attr.logical_name));

        if attr.attribute_type.is_lookup() {
            if !already_emitted(&mut emitted, &attr.logical_name) {
                plans.push(ColumnPlan {
                    logical_name: attr.logical_name.clone(),
                    display_name: attr.logical_name.clone(),
                    source_column: attr.logical_name.clone(),
                    kind: ColumnKind::LookupId,
                    type_info: map_attribute_type(attr.attribute_type),
                    is_hidden: true,
                    is_key: false,
                    is_default_label: false,
                    description: None,
                });
            }
            let name_column = attr.lookup_name_column();
            if !already_emitted(&mut emitted, &name_column) {
                plans.push(ColumnPlan {
                    logical_name: attr.logical_name.clone(),
                    display_name: attr.effective_display_name().to_string(),
                    source_column: name_column,
                    kind: ColumnKind::LookupName,
                    type_info: map_attribute_type(AttributeType::String),
                    is_hidden: false,
                    is_key: false,
                    is_default_label: is_primary_name,
                    description: attr.description.clone(),
                });
            }
        } else if attr.attribute_type.is_choice() {
            let name_column = attr.name_column();
            if already_emitted(&mut emitted, &name_column) {
                continue;
            }
            let metadata = match attr.attribute_type {
                AttributeType::Boolean => MetadataTable::GlobalOptionset,
                AttributeType::State | AttributeType::Status => MetadataTable::Status,
                _ => MetadataTable::Optionset,
            };
            plans.push(ColumnPlan {
                logical_name: attr.logical_name.clone(),
                display_name: attr.effective_display_name().to_string(),
                source_column: name_column,
                kind: ColumnKind::ChoiceName { metadata },
                type_info: map_attribute_type(AttributeType::String),
                is_hidden: false,
                is_key: false,
                is_default_label: false,
                description: attr.description.clone(),
            });
        } else {
            if already_emitted(&mut emitted, &attr.logical_name) {
                continue;
            }
            let wrapped = attr.attribute_type == AttributeType::DateTime
                && date_config
                    .is_some_and(|d| d.is_wrapped(&table.logical_name, &attr.logical_name));
            let (kind, type_info) = if wrapped {
                (
                    ColumnKind::WrappedDate,
                    map_attribute_type(AttributeType::DateOnly),
                )
            } else {
                if attr.attribute_type == AttributeType::Unknown {
                    tracing::warn!(
                        target: "pbipgen",
                        "unknown attribute type on '{}.{}', mapping to string",
                        table.logical_name,
                        attr.logical_name
                    );
                }
                (ColumnKind::Plain, map_attribute_type(attr.attribute_type))
            };
            plans.push(ColumnPlan {
                logical_name: attr.logical_name.clone(),
                display_name: attr.effective_display_name().to_string(),
                source_column: attr.logical_name.clone(),
                kind,
                type_info,
                is_hidden: false,
                is_key: false,
                is_default_label: is_primary_name,
                description: attr.description.clone(),
            });
        }
    }

    plans
}

/// Find the plan backing an attribute's visible column, if any.
pub fn visible_plan_for<'a>(plans: &'a [ColumnPlan], logical_name: &str) -> Option<&'a ColumnPlan> {
    plans
        .iter()
        .find(|p| !p.is_hidden && p.logical_name.eq_ignore_ascii_case(logical_name))
}
