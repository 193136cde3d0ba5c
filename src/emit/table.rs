//! Whole-table TMDL file emission.

use crate::merge::TableCarry;
use crate::model::{BuildRequest, TableSpec};
use crate::util::fresh_guid;

use super::column::emit_column;
use super::measure::emit_auto_measures;
use super::plan::ColumnPlan;
use super::query::partition_source_expr;
use super::quote::quote;

/// Render one table file, LF-internal. The caller converts to CRLF on write.
pub fn emit_table_file(
    table: &TableSpec,
    plans: &[ColumnPlan],
    request: &BuildRequest,
    carry: Option<&TableCarry>,
) -> String {
    let mut out = String::new();

    out.push_str(&format!("/// Source: {}\n", table.logical_name));
    out.push_str(&format!("table {}\n\n", quote(&table.display_name)));

    let table_tag = carry
        .and_then(|c| c.table_lineage_tag.clone())
        .unwrap_or_else(fresh_guid);
    out.push_str(&format!("\tlineageTag: {table_tag}\n\n"));

    for plan in plans {
        let column_carry = carry.and_then(|c| c.columns.get(&plan.display_name.to_lowercase()));
        emit_column(&mut out, plan, column_carry);
    }

    if let Some(carry) = carry {
        for block in &carry.user_columns {
            out.push_str(block);
            out.push('\n');
        }
    }

    emit_auto_measures(&mut out, table, request, carry);

    if let Some(carry) = carry {
        for block in &carry.user_measures {
            out.push_str(block);
            out.push('\n');
        }
        for block in &carry.unknown_blocks {
            out.push_str(block);
            out.push('\n');
        }
    }

    let source = partition_source_expr(table, plans, request);
    out.push_str(&format!("\tpartition {} = m\n", quote(&table.display_name)));
    out.push_str("\t\tmode: directQuery\n");
    out.push_str("\t\tsource =\n");
    out.push_str("\t\t\tlet\n");
    out.push_str(&format!("\t\t\t\tSource = {source}\n"));
    out.push_str("\t\t\tin\n");
    out.push_str("\t\t\t\tSource\n\n");

    out.push_str("\tannotation PBI_NavigationStepName = Navigation\n\n");
    out.push_str("\tannotation PBI_ResultType = Table\n");

    out
}
