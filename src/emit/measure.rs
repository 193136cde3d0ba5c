//! Auto-generated measure emission.
//!
//! Every table carries a row-count measure; fact tables additionally get a
//! deep link into the source environment. User measures are never written
//! here — the merger re-inserts them verbatim.

use crate::merge::TableCarry;
use crate::model::{BuildRequest, TableRole, TableSpec};
use crate::util::{fresh_guid, strip_url_scheme};

use super::quote::quote;

fn dax_table_ref(display_name: &str) -> String {
    format!("'{}'", display_name.replace('\'', "''"))
}

/// Append the auto-generated measures for one table.
pub fn emit_auto_measures(
    out: &mut String,
    table: &TableSpec,
    request: &BuildRequest,
    carry: Option<&TableCarry>,
) {
    let table_ref = dax_table_ref(&table.display_name);

    let count_name = format!("{} Count", table.display_name);
    let count_tag = carry
        .and_then(|c| c.auto_measure_tags.get("count").cloned())
        .unwrap_or_else(fresh_guid);
    out.push_str(&format!(
        "\tmeasure {} = COUNTROWS({table_ref})\n",
        quote(&count_name)
    ));
    out.push_str(&format!("\t\tlineageTag: {count_tag}\n"));
    out.push('\n');

    if table.role == TableRole::Fact {
        let link_name = format!("Link to {}", table.display_name);
        let link_tag = carry
            .and_then(|c| c.auto_measure_tags.get("link").cloned())
            .unwrap_or_else(fresh_guid);
        let host = strip_url_scheme(&request.dataverse_url);
        out.push_str(&format!(
            "\tmeasure {} = \"https://{host}/main.aspx?pagetype=entityrecord&etn={etn}&id=\" & SELECTEDVALUE({table_ref}[{pk}])\n",
            quote(&link_name),
            etn = table.logical_name,
            pk = table.primary_id_attribute,
        ));
        out.push_str(&format!("\t\tlineageTag: {link_tag}\n"));
        out.push('\n');
    }
}
