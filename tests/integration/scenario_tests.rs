//! End-to-end build and update scenarios over the bundled template fixture.

use pretty_assertions::assert_eq;

use rust_pbipgen::model::{AttributeType, ConnectionMode, DateTableConfig};
use rust_pbipgen::{ChangeKind, Impact};

use crate::common::{
    attribute, column_lineage_tags, insert_user_measure, opportunity_account_request, TestContext,
};

#[test]
fn test_first_build_two_tables_one_relationship() {
    let ctx = TestContext::new();
    let request = opportunity_account_request(&ctx);
    let outcome = ctx.apply(&request);
    assert!(outcome.applied);

    // Project skeleton cloned with the project name substituted.
    let pbip_root = request.pbip_root();
    assert!(pbip_root.join("SalesModel.pbip").exists());
    assert!(pbip_root.join("SalesModel.SemanticModel/.platform").exists());
    assert!(pbip_root.join("SalesModel.Report/definition.pbir").exists());

    let opportunity = ctx.read_table_file(&request, "Opportunity");
    assert!(opportunity.starts_with("/// Source: opportunity\ntable Opportunity\n"));
    assert!(opportunity.contains("\tcolumn opportunityid\n\t\tdataType: int64\n"));
    assert!(opportunity.contains("\t\tisKey\n"));
    assert!(opportunity.contains("\t\tsourceColumn: name\n"));
    assert!(opportunity.contains("formatString: \\$#,0.00;(\\$#,0.00);\\$#,0.00"));
    assert!(opportunity.contains("\tcolumn Account\n"));
    assert!(opportunity.contains("\t\tsourceColumn: accountidname\n"));

    // The select list is ordered and the state filter applied.
    assert!(opportunity.contains(
        "SELECT Base.opportunityid, Base.accountid, Base.name, Base.accountidname, Base.amount \
         FROM opportunity AS Base WHERE Base.statecode = 0"
    ));

    // The hidden lookup id column precedes the visible name column.
    let id_at = opportunity.find("\tcolumn accountid\n").expect("id column");
    let name_at = opportunity.find("\tcolumn Account\n").expect("name column");
    assert!(id_at < name_at);

    let relationships = ctx.read_definition_file(&request, "relationships.tmdl");
    assert_eq!(relationships.matches("relationship ").count(), 1);
    assert!(relationships.contains("\tfromColumn: Opportunity.accountid\n"));
    assert!(relationships.contains("\ttoColumn: Account.accountid\n"));

    let model = ctx.read_definition_file(&request, "model.tmdl");
    assert!(model.contains("annotation PBI_QueryOrder = [\"DataverseURL\",\"Opportunity\",\"Account\"]"));
    assert!(model.contains("ref table Opportunity\n"));
    assert!(model.contains("ref table Account\n"));
    assert!(!model.contains("ref table Date"));
}

#[test]
fn test_incremental_update_adds_column_and_preserves_measure() {
    let ctx = TestContext::new();
    let request = opportunity_account_request(&ctx);
    ctx.apply(&request);

    let measure_block = "\tmeasure 'Total Pipeline' = SUM('Opportunity'[Amount])\n\t\tlineageTag: 7d1a2f6e-55b1-4b9a-9d6e-1f2a3b4c5d6e\n";
    insert_user_measure(&ctx, &request, "Opportunity", measure_block);

    let before_tags = column_lineage_tags(&ctx.read_table_file(&request, "Opportunity"));

    let mut updated = opportunity_account_request(&ctx);
    updated.tables[0].attributes.push(attribute(
        "estimatedclosedate",
        "Estimated Close Date",
        AttributeType::DateTime,
    ));

    let analysis = ctx.analyze(&updated);
    let new_columns: Vec<_> = analysis
        .change_set
        .entries
        .iter()
        .filter(|e| e.kind == ChangeKind::NewColumn)
        .collect();
    assert_eq!(new_columns.len(), 1);
    assert_eq!(new_columns[0].subject, "Estimated Close Date");
    assert_eq!(new_columns[0].impact, Impact::Additive);
    let preserved: Vec<_> = analysis.change_set.preserved_measures().collect();
    assert_eq!(preserved.len(), 1);
    assert_eq!(preserved[0].subject, "Total Pipeline");
    assert_eq!(preserved[0].impact, Impact::Safe);

    ctx.apply(&updated);

    let opportunity = ctx.read_table_file(&request, "Opportunity");
    // The measure survives verbatim, between the columns and the partition.
    assert!(opportunity.contains(measure_block));
    let measure_at = opportunity.find("'Total Pipeline'").unwrap();
    let partition_at = opportunity.find("\tpartition ").unwrap();
    let last_column_at = opportunity.rfind("\tcolumn ").unwrap();
    assert!(last_column_at < measure_at && measure_at < partition_at);

    assert!(opportunity.contains("\tcolumn 'Estimated Close Date'\n"));
    assert!(opportunity.contains("Base.estimatedclosedate"));

    // Pre-existing columns keep their lineage tags.
    let after_tags = column_lineage_tags(&opportunity);
    for (display, tag) in &before_tags {
        let found = after_tags
            .iter()
            .find(|(d, _)| d == display)
            .unwrap_or_else(|| panic!("column {display} disappeared"));
        assert_eq!(&found.1, tag, "lineage tag of {display} changed");
    }
}

#[test]
fn test_rename_table_migrates_file_and_relationships() {
    let ctx = TestContext::new();
    let request = opportunity_account_request(&ctx);
    ctx.apply(&request);

    let account_tags = column_lineage_tags(&ctx.read_table_file(&request, "Account"));
    let old_relationships = ctx.read_definition_file(&request, "relationships.tmdl");

    let mut renamed = opportunity_account_request(&ctx);
    renamed.tables[1].display_name = "Customer".to_string();

    let analysis = ctx.analyze(&renamed);
    assert!(analysis
        .change_set
        .entries
        .iter()
        .any(|e| e.kind == ChangeKind::TableRenamed && e.impact == Impact::Moderate));

    ctx.apply(&renamed);

    assert!(!ctx.table_file_path(&request, "Account").exists());
    let customer = ctx.read_table_file(&renamed, "Customer");
    assert!(customer.starts_with("/// Source: account\ntable Customer\n"));

    // Lineage tags migrated to the renamed file.
    let customer_tags = column_lineage_tags(&customer);
    assert_eq!(account_tags, customer_tags);

    let relationships = ctx.read_definition_file(&renamed, "relationships.tmdl");
    assert_eq!(relationships.matches("relationship ").count(), 1);
    assert!(relationships.contains("\ttoColumn: Customer.accountid\n"));
    // The relationship GUID survives the rename.
    let old_guid = old_relationships
        .lines()
        .find(|l| l.starts_with("relationship "))
        .unwrap();
    assert!(relationships.contains(old_guid));

    let model = ctx.read_definition_file(&renamed, "model.tmdl");
    assert!(model.contains("annotation PBI_QueryOrder = [\"DataverseURL\",\"Opportunity\",\"Customer\"]"));
}

#[test]
fn test_date_table_wrap() {
    let ctx = TestContext::new();
    let mut request = opportunity_account_request(&ctx);
    request.tables[0].attributes.push(attribute(
        "estimatedclosedate",
        "Estimated Close Date",
        AttributeType::DateTime,
    ));
    request.date_config = Some(DateTableConfig {
        primary_date_table: "opportunity".to_string(),
        primary_date_field: "estimatedclosedate".to_string(),
        utc_offset_hours: -5.0,
        start_year: 2020,
        end_year: 2026,
        wrapped_fields: [("opportunity".to_string(), "estimatedclosedate".to_string())].into(),
    });
    ctx.apply(&request);

    let date = ctx.read_table_file(&request, "Date");
    assert!(date.contains("VAR _startdate = DATE(2020, 1, 1)"));
    assert!(date.contains("VAR _enddate = DATE(2027, 1, 1) - 1"));
    assert!(date.contains("dataCategory: Time"));

    let opportunity = ctx.read_table_file(&request, "Opportunity");
    assert!(opportunity.contains(
        "CAST(DATEADD(hour, -5, Base.estimatedclosedate) AS DATE) AS estimatedclosedate"
    ));
    assert!(opportunity
        .contains("\tcolumn 'Estimated Close Date'\n\t\tdataType: dateTime\n\t\tformatString: Short Date\n"));

    let relationships = ctx.read_definition_file(&request, "relationships.tmdl");
    assert!(relationships.contains("\tfromColumn: Opportunity.'Estimated Close Date'\n"));
    assert!(relationships.contains("\ttoColumn: Date.Date\n"));

    let model = ctx.read_definition_file(&request, "model.tmdl");
    assert!(model.contains("annotation PBI_QueryOrder = [\"DataverseURL\",\"Opportunity\",\"Account\",\"Date\"]"));
    assert!(model.contains("ref table Date\n"));
}

#[test]
fn test_analyze_after_apply_reports_only_preservation() {
    let ctx = TestContext::new();
    let request = opportunity_account_request(&ctx);
    ctx.apply(&request);

    let analysis = ctx.analyze(&request);
    let change_set = &analysis.change_set;

    assert_eq!(change_set.count_of(Impact::Additive), 0);
    assert_eq!(change_set.count_of(Impact::Moderate), 0);
    assert_eq!(change_set.count_of(Impact::Destructive), 0);
    assert_eq!(change_set.warnings().count(), 0);

    let preserve_tables = change_set
        .entries
        .iter()
        .filter(|e| e.kind == ChangeKind::PreserveTable)
        .count();
    assert_eq!(preserve_tables, 2);
    assert_eq!(
        change_set
            .entries
            .iter()
            .filter(|e| e.kind == ChangeKind::PreserveRelationship)
            .count(),
        1
    );
    assert_eq!(
        change_set
            .entries
            .iter()
            .filter(|e| e.kind == ChangeKind::PreserveUrl)
            .count(),
        1
    );
}

#[test]
fn test_connection_mode_switch_is_destructive_and_preserves_content() {
    let ctx = TestContext::new();
    let request = opportunity_account_request(&ctx);
    ctx.apply(&request);

    let measure_block = "\tmeasure 'Win Rate' = DIVIDE([Won], [Total])\n\t\tlineageTag: 2b3c4d5e-6f70-4182-93a4-b5c6d7e8f901\n";
    insert_user_measure(&ctx, &request, "Opportunity", measure_block);
    let before_tags = column_lineage_tags(&ctx.read_table_file(&request, "Opportunity"));

    let mut fabric = opportunity_account_request(&ctx);
    fabric.connection_mode = ConnectionMode::FabricLink {
        sql_endpoint: "abc123.datawarehouse.fabric.microsoft.com".to_string(),
        lakehouse: "DataverseLake".to_string(),
    };

    let analysis = ctx.analyze(&fabric);
    assert!(analysis
        .change_set
        .entries
        .iter()
        .any(|e| e.kind == ChangeKind::ConnectionModeChanged && e.impact == Impact::Destructive));
    let query_changed = analysis
        .change_set
        .entries
        .iter()
        .filter(|e| e.kind == ChangeKind::QueryChanged)
        .count();
    assert_eq!(query_changed, 2, "every table's partition is invalidated");

    ctx.apply(&fabric);

    let expressions = ctx.read_definition_file(&fabric, "expressions.tmdl");
    assert!(expressions.contains("expression FabricSQLEndpoint = \"abc123.datawarehouse.fabric.microsoft.com\""));
    assert!(expressions.contains("expression FabricLakehouse = \"DataverseLake\""));

    let opportunity = ctx.read_table_file(&fabric, "Opportunity");
    assert!(opportunity.contains("Sql.Database(FabricSQLEndpoint, FabricLakehouse)"));
    assert!(opportunity.contains(measure_block));
    let after_tags = column_lineage_tags(&opportunity);
    assert_eq!(before_tags, after_tags);
}

#[test]
fn test_user_added_relationship_survives_rebuild() {
    let ctx = TestContext::new();
    let request = opportunity_account_request(&ctx);
    ctx.apply(&request);

    // Hand-add a relationship the request knows nothing about.
    let path = request.definition_dir().join("relationships.tmdl");
    let mut text = std::fs::read_to_string(&path).unwrap();
    text.push_str("\r\nrelationship 99999999-8888-7777-6666-555555555555\r\n\tisActive: false\r\n\tfromColumn: Opportunity.opportunityid\r\n\ttoColumn: Account.accountid\r\n");
    std::fs::write(&path, text).unwrap();

    ctx.apply(&request);
    let relationships = ctx.read_definition_file(&request, "relationships.tmdl");
    assert!(relationships.contains("/// User-added relationship"));
    assert!(relationships.contains("relationship 99999999-8888-7777-6666-555555555555"));

    // The next analyze sees it as preserved, not as a change.
    let analysis = ctx.analyze(&request);
    assert!(analysis
        .change_set
        .entries
        .iter()
        .any(|e| e.kind == ChangeKind::PreserveRelationship));
    assert_eq!(analysis.change_set.count_of(Impact::Moderate), 0);
}
