//! Partition source expression emission.
//!
//! Builds the per-table SQL (select list, WHERE clause, FabricLink label
//! joins) and wraps it in the M expression the partition carries.

use crate::model::{BuildRequest, ConnectionMode, TableSpec};
use crate::util::strip_url_scheme;

use super::plan::{ColumnKind, ColumnPlan};

/// Format the UTC offset for DATEADD: whole hours without a fraction.
fn format_offset(hours: f64) -> String {
    if hours.fract() == 0.0 {
        format!("{}", hours as i64)
    } else {
        format!("{hours}")
    }
}

/// One select-list item for a planned column.
fn select_item(
    plan: &ColumnPlan,
    table: &TableSpec,
    request: &BuildRequest,
    join_alias: &mut impl FnMut() -> String,
    joins: &mut Vec<String>,
) -> String {
    match plan.kind {
        ColumnKind::WrappedDate => {
            let offset = request
                .date_config
                .as_ref()
                .map(|d| format_offset(d.utc_offset_hours))
                .unwrap_or_else(|| "0".to_string());
            format!(
                "CAST(DATEADD(hour, {offset}, Base.{col}) AS DATE) AS {col}",
                col = plan.logical_name
            )
        }
        ColumnKind::ChoiceName { metadata } if request.connection_mode.is_fabric() => {
            let alias = join_alias();
            joins.push(format!(
                "LEFT JOIN [dbo].[{meta}] AS {alias} ON {alias}.EntityName = '{entity}' AND {alias}.OptionSetName = '{attr}' AND {alias}.[{value}] = Base.{attr} AND {alias}.LocalizedLabelLanguageCode = 1033",
                meta = metadata.table_name(),
                entity = table.logical_name,
                attr = plan.logical_name,
                value = metadata.value_column(),
            ));
            format!("{alias}.LocalizedLabel AS {}", plan.source_column)
        }
        _ => format!("Base.{}", plan.source_column),
    }
}

/// Build the native SQL for one table's partition.
pub fn build_sql(table: &TableSpec, plans: &[ColumnPlan], request: &BuildRequest) -> String {
    let mut joins: Vec<String> = Vec::new();
    let mut next_alias = 0usize;
    let mut join_alias = || {
        next_alias += 1;
        format!("O{next_alias}")
    };

    let items: Vec<String> = plans
        .iter()
        .map(|p| select_item(p, table, request, &mut join_alias, &mut joins))
        .collect();

    let from_object = if request.connection_mode.is_fabric() {
        format!("[dbo].[{}]", table.logical_name)
    } else {
        table.schema_name.clone()
    };

    let mut sql = format!("SELECT {} FROM {} AS Base", items.join(", "), from_object);
    for join in &joins {
        sql.push(' ');
        sql.push_str(join);
    }

    let mut predicates: Vec<String> = Vec::new();
    if table.has_state_code {
        predicates.push("Base.statecode = 0".to_string());
    }
    if let Some(view) = &table.view {
        let fragment = view.where_sql.trim();
        if !fragment.is_empty() {
            predicates.push(format!("({fragment})"));
        }
    }
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }

    sql
}

/// The M expression a partition's `source =` carries, on one line.
pub fn partition_source_expr(
    table: &TableSpec,
    plans: &[ColumnPlan],
    request: &BuildRequest,
) -> String {
    let sql = build_sql(table, plans, request).replace('"', "\"\"");
    match &request.connection_mode {
        ConnectionMode::Tds => format!(
            "Value.NativeQuery(CommonDataService.Database(DataverseURL, [CreateNavigationProperties=false]), \"{sql}\", null, [EnableFolding=true])"
        ),
        ConnectionMode::FabricLink { .. } => format!(
            "Value.NativeQuery(Sql.Database(FabricSQLEndpoint, FabricLakehouse), \"{sql}\", null, [EnableFolding=true])"
        ),
    }
}

/// The expressions the partition relies on, for `expressions.tmdl`.
pub fn expression_values(request: &BuildRequest) -> Vec<(&'static str, String)> {
    let mut values = vec![(
        "DataverseURL",
        strip_url_scheme(&request.dataverse_url).to_string(),
    )];
    if let ConnectionMode::FabricLink {
        sql_endpoint,
        lakehouse,
    } = &request.connection_mode
    {
        values.push(("FabricSQLEndpoint", sql_endpoint.clone()));
        values.push(("FabricLakehouse", lakehouse.clone()));
    }
    values
}
