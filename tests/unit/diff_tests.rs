//! Unit tests for the semantic differ.

use std::collections::HashMap;
use std::path::PathBuf;

use rust_pbipgen::diff::{compute_change_set, ChangeKind, ChangeSet, Impact};
use rust_pbipgen::emit::plan::{plan_columns, ColumnPlan};
use rust_pbipgen::emit::relationships::plan_relationships;
use rust_pbipgen::emit::table::emit_table_file;
use rust_pbipgen::merge::plan_preservation;
use rust_pbipgen::model::{
    AttributeSpec, AttributeType, BuildRequest, ConnectionMode, RelationshipSpec, TableRole,
    TableSpec,
};
use rust_pbipgen::parse::{
    parse_relationships_file, parse_table_file, ExistingModel, ExistingTable, TableFileOutcome,
};

fn attr(logical: &str, display: &str, attribute_type: AttributeType) -> AttributeSpec {
    AttributeSpec {
        logical_name: logical.to_string(),
        display_name: Some(display.to_string()),
        schema_name: None,
        description: None,
        attribute_type,
        targets: vec![],
        is_required: false,
        virtual_attribute_name: None,
    }
}

fn quote_table(attributes: Vec<AttributeSpec>) -> TableSpec {
    TableSpec {
        logical_name: "quote".to_string(),
        display_name: "Quote".to_string(),
        schema_name: "quote".to_string(),
        primary_id_attribute: "quoteid".to_string(),
        primary_name_attribute: Some("name".to_string()),
        role: TableRole::Fact,
        has_state_code: false,
        attributes,
        view: None,
        required_lookup_columns: Default::default(),
    }
}

fn request(tables: Vec<TableSpec>, relationships: Vec<RelationshipSpec>) -> BuildRequest {
    BuildRequest {
        project_name: "Demo".to_string(),
        output_folder: PathBuf::from("/tmp/out"),
        template_folder: PathBuf::from("/tmp/template"),
        dataverse_url: "org.crm.dynamics.com".to_string(),
        tables,
        relationships,
        date_config: None,
        connection_mode: ConnectionMode::Tds,
    }
}

/// Emit the request's tables, parse them back, and present the result as the
/// prior on-disk state.
fn as_existing(request: &BuildRequest) -> ExistingModel {
    let mut existing = ExistingModel::default();
    let mut plans_by_table = HashMap::new();
    for table in &request.tables {
        plans_by_table.insert(
            table.logical_name.to_lowercase(),
            plan_columns(table, request.date_config.as_ref()),
        );
    }
    for table in &request.tables {
        let plans = &plans_by_table[&table.logical_name.to_lowercase()];
        let text = emit_table_file(table, plans, request, None);
        let TableFileOutcome::Table(parsed) = parse_table_file(&text) else {
            panic!("emitted table failed to parse");
        };
        existing.tables.push(ExistingTable {
            path: PathBuf::from(format!("{}.tmdl", table.display_name)),
            file_stem: table.display_name.clone(),
            parsed,
        });
    }
    let planned = plan_relationships(request, &plans_by_table);
    let relationships_text = rust_pbipgen::emit::relationships::emit_relationships_file(
        &planned,
        &Default::default(),
    );
    existing.relationships = parse_relationships_file(&relationships_text);
    existing
}

fn diff_against(request: &BuildRequest, existing: &ExistingModel) -> ChangeSet {
    let mut plans_by_table: HashMap<String, Vec<ColumnPlan>> = HashMap::new();
    for table in &request.tables {
        plans_by_table.insert(
            table.logical_name.to_lowercase(),
            plan_columns(table, request.date_config.as_ref()),
        );
    }
    let planned = plan_relationships(request, &plans_by_table);
    let preservation = plan_preservation(request, &plans_by_table, &planned, existing);
    compute_change_set(request, &plans_by_table, &planned, &preservation, existing)
}

#[test]
fn test_unchanged_model_reports_only_preservation() {
    let req = request(
        vec![quote_table(vec![attr("name", "Name", AttributeType::String)])],
        vec![],
    );
    let existing = as_existing(&req);
    let change_set = diff_against(&req, &existing);
    assert!(!change_set.has_changes());
    assert!(change_set
        .entries
        .iter()
        .any(|e| e.kind == ChangeKind::PreserveTable));
}

#[test]
fn test_added_attribute_is_additive_new_column() {
    let old = request(
        vec![quote_table(vec![attr("name", "Name", AttributeType::String)])],
        vec![],
    );
    let existing = as_existing(&old);
    let new = request(
        vec![quote_table(vec![
            attr("name", "Name", AttributeType::String),
            attr("totalamount", "Total Amount", AttributeType::Money),
        ])],
        vec![],
    );
    let change_set = diff_against(&new, &existing);
    let entry = change_set
        .entries
        .iter()
        .find(|e| e.kind == ChangeKind::NewColumn)
        .expect("new column entry");
    assert_eq!(entry.impact, Impact::Additive);
    assert_eq!(entry.subject, "Total Amount");
    // A new column also changes the select list.
    assert!(change_set
        .entries
        .iter()
        .any(|e| e.kind == ChangeKind::QueryChanged));
}

#[test]
fn test_dropped_attribute_is_removed_column() {
    let old = request(
        vec![quote_table(vec![
            attr("name", "Name", AttributeType::String),
            attr("discount", "Discount", AttributeType::Decimal),
        ])],
        vec![],
    );
    let existing = as_existing(&old);
    let new = request(
        vec![quote_table(vec![attr("name", "Name", AttributeType::String)])],
        vec![],
    );
    let change_set = diff_against(&new, &existing);
    let entry = change_set
        .entries
        .iter()
        .find(|e| e.kind == ChangeKind::RemovedColumn)
        .expect("removed column entry");
    assert_eq!(entry.impact, Impact::Moderate);
    assert_eq!(entry.subject, "Discount");
}

#[test]
fn test_type_change_is_modified_column() {
    let old = request(
        vec![quote_table(vec![attr("rank", "Rank", AttributeType::Integer)])],
        vec![],
    );
    let existing = as_existing(&old);
    let new = request(
        vec![quote_table(vec![attr("rank", "Rank", AttributeType::Decimal)])],
        vec![],
    );
    let change_set = diff_against(&new, &existing);
    let entry = change_set
        .entries
        .iter()
        .find(|e| e.kind == ChangeKind::ModifiedColumn)
        .expect("modified column entry");
    assert_eq!(entry.impact, Impact::Moderate);
    assert!(entry.detail.contains("dataType"));
}

#[test]
fn test_display_name_case_change_is_modified_column() {
    let old = request(
        vec![quote_table(vec![attr(
            "totalamount",
            "total amount",
            AttributeType::Money,
        )])],
        vec![],
    );
    let existing = as_existing(&old);
    let new = request(
        vec![quote_table(vec![attr(
            "totalamount",
            "Total Amount",
            AttributeType::Money,
        )])],
        vec![],
    );
    let change_set = diff_against(&new, &existing);
    let entry = change_set
        .entries
        .iter()
        .find(|e| e.kind == ChangeKind::ModifiedColumn)
        .expect("modified column entry");
    assert_eq!(entry.impact, Impact::Moderate);
    assert!(entry.detail.contains("displayName 'total amount' -> 'Total Amount'"));
    // The data type is unchanged, so only the name drift is reported.
    assert!(!entry.detail.contains("dataType"));
}

#[test]
fn test_user_added_column_is_not_removed() {
    let req = request(
        vec![quote_table(vec![attr("name", "Name", AttributeType::String)])],
        vec![],
    );
    let mut existing = as_existing(&req);
    // A column block without the logical-name marker is user-authored.
    let user_column = "\tcolumn 'My Custom Flag'\n\t\tdataType: string\n\t\tlineageTag: 11111111-2222-3333-4444-555555555555\n\t\tsummarizeBy: none\n\t\tsourceColumn: customflag\n";
    let TableFileOutcome::Table(parsed) = parse_table_file(&format!(
        "/// Source: quote\ntable Quote\n\n{user_column}"
    )) else {
        panic!("parse failed");
    };
    existing.tables[0]
        .parsed
        .columns
        .extend(parsed.columns.clone());

    let change_set = diff_against(&req, &existing);
    assert!(!change_set
        .entries
        .iter()
        .any(|e| e.kind == ChangeKind::RemovedColumn));
}

#[test]
fn test_removed_column_referenced_by_preserved_relationship_is_destructive() {
    let mut with_lookup = quote_table(vec![attr("name", "Name", AttributeType::String)]);
    with_lookup
        .required_lookup_columns
        .insert("accountid".to_string());
    let old = request(vec![with_lookup], vec![]);
    let mut existing = as_existing(&old);

    // A hand-added relationship rides on the lookup column.
    let text = "relationship aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee\n\tfromColumn: Quote.accountid\n\ttoColumn: Account.accountid\n";
    existing.relationships = parse_relationships_file(text);

    let new = request(
        vec![quote_table(vec![attr("name", "Name", AttributeType::String)])],
        vec![],
    );
    let change_set = diff_against(&new, &existing);
    let entry = change_set
        .entries
        .iter()
        .find(|e| e.kind == ChangeKind::RemovedColumn)
        .expect("removed column entry");
    assert_eq!(entry.impact, Impact::Destructive);
}

#[test]
fn test_role_change_dropping_link_measure_is_destructive() {
    let old = request(
        vec![quote_table(vec![attr("name", "Name", AttributeType::String)])],
        vec![],
    );
    let existing = as_existing(&old);

    let mut demoted = quote_table(vec![attr("name", "Name", AttributeType::String)]);
    demoted.role = TableRole::Dimension;
    let new = request(vec![demoted], vec![]);
    let change_set = diff_against(&new, &existing);
    assert!(change_set
        .entries
        .iter()
        .any(|e| e.kind == ChangeKind::RoleChanged && e.impact == Impact::Destructive));
}

#[test]
fn test_marked_user_relationship_reports_as_preserved() {
    let req = request(
        vec![quote_table(vec![attr("name", "Name", AttributeType::String)])],
        vec![],
    );
    let mut existing = as_existing(&req);
    let text = "/// User-added relationship\nrelationship aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee\n\tfromColumn: Quote.quoteid\n\ttoColumn: Legacy.quoteid\n";
    existing.relationships = parse_relationships_file(text);

    let change_set = diff_against(&req, &existing);
    assert!(change_set
        .entries
        .iter()
        .any(|e| e.kind == ChangeKind::PreserveRelationship));
    assert!(!change_set
        .entries
        .iter()
        .any(|e| e.kind == ChangeKind::RemovedRelationship));
}

#[test]
fn test_unmarked_vanished_relationship_reported_once() {
    let req = request(
        vec![quote_table(vec![attr("name", "Name", AttributeType::String)])],
        vec![],
    );
    let mut existing = as_existing(&req);
    let text = "relationship aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee\n\tfromColumn: Quote.quoteid\n\ttoColumn: Legacy.quoteid\n";
    existing.relationships = parse_relationships_file(text);

    let change_set = diff_against(&req, &existing);
    assert!(change_set
        .entries
        .iter()
        .any(|e| e.kind == ChangeKind::RemovedRelationship && e.impact == Impact::Moderate));
}
