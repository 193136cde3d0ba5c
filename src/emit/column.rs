//! Column block emission.

use crate::merge::ColumnCarry;
use crate::util::fresh_guid;

use super::plan::ColumnPlan;
use super::quote::quote;

/// Append one column block, trailing blank line included.
pub fn emit_column(out: &mut String, plan: &ColumnPlan, carry: Option<&ColumnCarry>) {
    out.push_str(&format!("\t/// {}\n", plan.logical_name));

    let description: &[String] = carry.map(|c| c.description.as_slice()).unwrap_or(&[]);
    if description.is_empty() {
        if let Some(text) = &plan.description {
            for line in text.lines() {
                out.push_str(&format!("\t/// {line}\n"));
            }
        }
    } else {
        for line in description {
            out.push_str(&format!("\t/// {line}\n"));
        }
    }

    out.push_str(&format!("\tcolumn {}\n", quote(&plan.display_name)));
    out.push_str(&format!("\t\tdataType: {}\n", plan.type_info.data_type));

    let format_string = carry
        .and_then(|c| c.format_string.as_deref())
        .or(plan.type_info.format_string);
    if let Some(format_string) = format_string {
        out.push_str(&format!("\t\tformatString: {format_string}\n"));
    }
    if let Some(provider) = plan.type_info.source_provider_type {
        out.push_str(&format!("\t\tsourceProviderType: {provider}\n"));
    }
    if plan.is_hidden {
        out.push_str("\t\tisHidden\n");
    }
    if plan.is_key {
        out.push_str("\t\tisKey\n");
    }

    let lineage_tag = carry
        .and_then(|c| c.lineage_tag.clone())
        .unwrap_or_else(fresh_guid);
    out.push_str(&format!("\t\tlineageTag: {lineage_tag}\n"));

    if plan.is_default_label {
        out.push_str("\t\tisDefaultLabel\n");
    }

    let summarize_by = carry
        .and_then(|c| c.summarize_by.as_deref())
        .unwrap_or(plan.type_info.summarize_by);
    out.push_str(&format!("\t\tsummarizeBy: {summarize_by}\n"));
    out.push_str(&format!("\t\tsourceColumn: {}\n", plan.source_column));

    out.push('\n');
    out.push_str("\t\tannotation SummarizationSetBy = Automatic\n");
    if let Some(carry) = carry {
        for annotation in &carry.annotations {
            out.push('\n');
            out.push_str(&format!("\t\tannotation {annotation}\n"));
        }
    }
    out.push('\n');
}
