//! Calendar table instantiation.
//!
//! The template's `DateTable.tmdl` is opaque except for two anchored DAX
//! variables that define the calendar range.

use anyhow::{bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static START_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"VAR\s+_startdate\s*=\s*DATE\([^)]*\)").expect("startdate regex"));
static END_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"VAR\s+_enddate\s*=\s*DATE\([^)]*\)(\s*-\s*1)?").expect("enddate regex")
});

/// Substitute the calendar range into the template text.
pub fn instantiate_date_table(template: &str, start_year: i32, end_year: i32) -> Result<String> {
    if !START_RE.is_match(template) {
        bail!("DateTable template has no 'VAR _startdate = DATE(...)' anchor");
    }
    if !END_RE.is_match(template) {
        bail!("DateTable template has no 'VAR _enddate = DATE(...)' anchor");
    }

    let start = format!("VAR _startdate = DATE({start_year}, 1, 1)");
    let end = format!("VAR _enddate = DATE({}, 1, 1) - 1", end_year + 1);

    let text = START_RE.replace(template, start.as_str());
    let text = END_RE.replace(&text, end.as_str());
    Ok(text.into_owned())
}
