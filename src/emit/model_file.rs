//! `model.tmdl` emission. The file is rewritten in full on every build.

use crate::model::BuildRequest;

use super::quote::quote;

pub fn emit_model_tmdl(request: &BuildRequest) -> String {
    let mut out = String::new();

    out.push_str("model Model\n");
    out.push_str("\tculture: en-US\n");
    out.push_str("\tdefaultPowerBIDataSourceVersion: powerBI_V3\n");
    out.push_str("\tsourceQueryCulture: en-US\n");
    out.push_str("\tdataAccessOptions\n");
    out.push_str("\t\tlegacyRedirects\n");
    out.push_str("\t\treturnErrorValuesAsNull\n\n");

    out.push_str("annotation __PBI_TimeIntelligenceEnabled = 0\n\n");

    let mut query_order: Vec<String> = vec!["\"DataverseURL\"".to_string()];
    query_order.extend(
        request
            .tables
            .iter()
            .map(|t| format!("\"{}\"", t.display_name.replace('"', "\\\""))),
    );
    if request.date_config.is_some() {
        query_order.push("\"Date\"".to_string());
    }
    out.push_str(&format!(
        "annotation PBI_QueryOrder = [{}]\n\n",
        query_order.join(",")
    ));

    out.push_str("annotation PBI_ProTooling = [\"DevMode\"]\n\n");

    for table in &request.tables {
        out.push_str(&format!("ref table {}\n", quote(&table.display_name)));
    }
    if request.date_config.is_some() {
        out.push_str("ref table Date\n");
    }
    out.push('\n');

    out.push_str("ref cultureInfo en-US\n");

    out
}
