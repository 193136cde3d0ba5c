//! `expressions.tmdl` emission.
//!
//! Carries the shared M parameters the partitions reference: the Dataverse
//! host, plus the Fabric endpoint pair under FabricLink.

use std::collections::HashMap;

use crate::model::BuildRequest;
use crate::util::fresh_guid;

use super::query::expression_values;

/// Render the expressions file, preserving prior lineage tags by name.
pub fn emit_expressions_tmdl(
    request: &BuildRequest,
    expression_tags: &HashMap<String, String>,
) -> String {
    let mut out = String::new();

    for (name, value) in expression_values(request) {
        if !out.is_empty() {
            out.push('\n');
        }
        let tag = expression_tags
            .get(name)
            .cloned()
            .unwrap_or_else(fresh_guid);
        let literal = value.replace('"', "\"\"");
        out.push_str(&format!(
            "expression {name} = \"{literal}\" meta [IsParameterQuery=true, Type=\"Text\", IsParameterQueryRequired=true]\n"
        ));
        out.push_str(&format!("\tlineageTag: {tag}\n\n"));
        out.push_str("\tannotation PBI_ResultType = Text\n");
    }

    out
}
