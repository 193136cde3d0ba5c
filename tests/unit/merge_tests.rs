//! Unit tests for preservation planning.

use std::collections::HashMap;
use std::path::PathBuf;

use rust_pbipgen::emit::plan::{plan_columns, ColumnPlan};
use rust_pbipgen::emit::relationships::plan_relationships;
use rust_pbipgen::merge::{auto_measure_names, plan_preservation};
use rust_pbipgen::model::{
    AttributeSpec, AttributeType, BuildRequest, ConnectionMode, RelationshipSpec, TableRole,
    TableSpec,
};
use rust_pbipgen::parse::{
    parse_relationships_file, parse_table_file, ExistingModel, ExistingTable, TableFileOutcome,
};

const LEAD_FILE: &str = "/// Source: lead\ntable Lead\n\n\tlineageTag: 10000000-0000-0000-0000-000000000001\n\n\t/// leadid\n\tcolumn leadid\n\t\tdataType: int64\n\t\tisHidden\n\t\tisKey\n\t\tlineageTag: 10000000-0000-0000-0000-000000000002\n\t\tsummarizeBy: none\n\t\tsourceColumn: leadid\n\n\t\tannotation SummarizationSetBy = Automatic\n\n\t/// subject\n\t/// Short description entered at capture time.\n\tcolumn Topic\n\t\tdataType: string\n\t\tformatString: ;;;\n\t\tlineageTag: 10000000-0000-0000-0000-000000000003\n\t\tsummarizeBy: none\n\t\tsourceColumn: subject\n\n\t\tannotation SummarizationSetBy = Automatic\n\n\t\tannotation PBI_FormatHint = {\"isText\":true}\n\n\tcolumn Scratchpad\n\t\tdataType: string\n\t\tlineageTag: 10000000-0000-0000-0000-000000000004\n\t\tsummarizeBy: none\n\t\tsourceColumn: scratch\n\n\tmeasure 'Lead Count' = COUNTROWS('Lead')\n\t\tlineageTag: 10000000-0000-0000-0000-000000000005\n\n\tmeasure 'Conversion Rate' = DIVIDE([Won], [All])\n\t\tlineageTag: 10000000-0000-0000-0000-000000000006\n\n\tpartition Lead = m\n\t\tmode: directQuery\n\t\tsource =\n\t\t\tlet\n\t\t\t\tSource = Value.NativeQuery(CommonDataService.Database(DataverseURL, [CreateNavigationProperties=false]), \"SELECT Base.leadid, Base.subject FROM lead AS Base\", null, [EnableFolding=true])\n\t\t\tin\n\t\t\t\tSource\n\n\tannotation PBI_ResultType = Table\n";

fn lead_table() -> TableSpec {
    TableSpec {
        logical_name: "lead".to_string(),
        display_name: "Lead".to_string(),
        schema_name: "lead".to_string(),
        primary_id_attribute: "leadid".to_string(),
        primary_name_attribute: Some("subject".to_string()),
        role: TableRole::Dimension,
        has_state_code: false,
        attributes: vec![AttributeSpec {
            logical_name: "subject".to_string(),
            display_name: Some("Topic".to_string()),
            schema_name: None,
            description: None,
            attribute_type: AttributeType::String,
            targets: vec![],
            is_required: false,
            virtual_attribute_name: None,
        }],
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

fn existing_from(file: &str, stem: &str) -> ExistingModel {
    let TableFileOutcome::Table(parsed) = parse_table_file(file) else {
        panic!("fixture failed to parse");
    };
    ExistingModel {
        tables: vec![ExistingTable {
            path: PathBuf::from(format!("/tmp/tables/{stem}.tmdl")),
            file_stem: stem.to_string(),
            parsed,
        }],
        ..Default::default()
    }
}

fn plans_for(req: &BuildRequest) -> HashMap<String, Vec<ColumnPlan>> {
    req.tables
        .iter()
        .map(|t| {
            (
                t.logical_name.to_lowercase(),
                plan_columns(t, req.date_config.as_ref()),
            )
        })
        .collect()
}

#[test]
fn test_lineage_tags_and_metadata_carried_for_matched_columns() {
    let req = request(vec![lead_table()], vec![]);
    let plans = plans_for(&req);
    let planned = plan_relationships(&req, &plans);
    let existing = existing_from(LEAD_FILE, "Lead");
    let preservation = plan_preservation(&req, &plans, &planned, &existing);

    let carry = preservation.table_carry("lead").expect("table carry");
    assert_eq!(
        carry.table_lineage_tag.as_deref(),
        Some("10000000-0000-0000-0000-000000000001")
    );
    let topic = carry.columns.get("topic").expect("topic carry");
    assert_eq!(
        topic.lineage_tag.as_deref(),
        Some("10000000-0000-0000-0000-000000000003")
    );
    // User edits survive when the data type is unchanged.
    assert_eq!(topic.format_string.as_deref(), Some(";;;"));
    assert_eq!(topic.description, vec!["Short description entered at capture time."]);
    assert_eq!(topic.annotations, vec!["PBI_FormatHint = {\"isText\":true}"]);
}

#[test]
fn test_metadata_dropped_when_type_changes() {
    let mut retyped = lead_table();
    retyped.attributes[0].attribute_type = AttributeType::Integer;
    let req = request(vec![retyped], vec![]);
    let plans = plans_for(&req);
    let planned = plan_relationships(&req, &plans);
    let existing = existing_from(LEAD_FILE, "Lead");
    let preservation = plan_preservation(&req, &plans, &planned, &existing);

    let topic = preservation
        .table_carry("lead")
        .and_then(|c| c.columns.get("topic"))
        .expect("topic carry");
    // The identity (lineage tag) survives; the stale metadata does not.
    assert!(topic.lineage_tag.is_some());
    assert!(topic.format_string.is_none());
    assert!(topic.description.is_empty());
}

#[test]
fn test_user_measures_extracted_and_auto_measures_excluded() {
    let req = request(vec![lead_table()], vec![]);
    let plans = plans_for(&req);
    let planned = plan_relationships(&req, &plans);
    let existing = existing_from(LEAD_FILE, "Lead");
    let preservation = plan_preservation(&req, &plans, &planned, &existing);

    let carry = preservation.table_carry("lead").expect("table carry");
    assert_eq!(carry.user_measures.len(), 1);
    assert!(carry.user_measures[0].contains("'Conversion Rate'"));
    assert_eq!(
        carry.auto_measure_tags.get("count").map(String::as_str),
        Some("10000000-0000-0000-0000-000000000005")
    );
}

#[test]
fn test_user_column_kept_verbatim() {
    let req = request(vec![lead_table()], vec![]);
    let plans = plans_for(&req);
    let planned = plan_relationships(&req, &plans);
    let existing = existing_from(LEAD_FILE, "Lead");
    let preservation = plan_preservation(&req, &plans, &planned, &existing);

    let carry = preservation.table_carry("lead").expect("table carry");
    assert_eq!(carry.user_columns.len(), 1);
    assert!(carry.user_columns[0].contains("column Scratchpad"));
}

#[test]
fn test_rename_detected_and_auto_measure_tags_follow() {
    let mut renamed = lead_table();
    renamed.display_name = "Prospect".to_string();
    let req = request(vec![renamed], vec![]);
    let plans = plans_for(&req);
    let planned = plan_relationships(&req, &plans);
    let existing = existing_from(LEAD_FILE, "Lead");
    let preservation = plan_preservation(&req, &plans, &planned, &existing);

    assert_eq!(preservation.renames.len(), 1);
    assert_eq!(preservation.renames[0].old_display_name, "Lead");
    assert_eq!(preservation.renames[0].new_display_name, "Prospect");

    // 'Lead Count' feeds the renamed 'Prospect Count' tag.
    let carry = preservation.table_carry("lead").expect("table carry");
    assert!(carry.auto_measure_tags.contains_key("count"));
    let (count_name, _) = auto_measure_names("Prospect");
    assert_eq!(count_name, "Prospect Count");
}

#[test]
fn test_matched_relationship_guid_carried_and_user_block_marked() {
    let mut source = lead_table();
    source
        .required_lookup_columns
        .insert("parentaccountid".to_string());
    let target = TableSpec {
        logical_name: "account".to_string(),
        display_name: "Account".to_string(),
        schema_name: "account".to_string(),
        primary_id_attribute: "accountid".to_string(),
        primary_name_attribute: None,
        role: TableRole::Dimension,
        has_state_code: false,
        attributes: vec![],
        view: None,
        required_lookup_columns: Default::default(),
    };
    let req = request(
        vec![source, target],
        vec![RelationshipSpec {
            source_table: "lead".to_string(),
            source_attribute: "parentaccountid".to_string(),
            target_table: "account".to_string(),
            is_active: true,
            is_snowflake: false,
            assume_referential_integrity: false,
        }],
    );
    let plans = plans_for(&req);
    let planned = plan_relationships(&req, &plans);

    let mut existing = existing_from(LEAD_FILE, "Lead");
    existing.relationships = parse_relationships_file(
        "relationship aaaaaaaa-0000-0000-0000-000000000001\n\tfromColumn: Lead.parentaccountid\n\ttoColumn: Account.accountid\n\nrelationship aaaaaaaa-0000-0000-0000-000000000002\n\tfromColumn: Lead.leadid\n\ttoColumn: Legacy.leadid\n",
    );
    let preservation = plan_preservation(&req, &plans, &planned, &existing);

    assert_eq!(
        preservation
            .relationships
            .guid_by_tuple
            .get("lead.parentaccountid->account.accountid")
            .map(String::as_str),
        Some("aaaaaaaa-0000-0000-0000-000000000001")
    );
    assert_eq!(preservation.relationships.user_blocks.len(), 1);
    assert!(preservation.relationships.user_blocks[0]
        .starts_with("/// User-added relationship\n"));
}
