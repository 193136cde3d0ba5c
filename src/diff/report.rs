//! Human-readable change-set report printer.

use super::types::{ChangeKind, ChangeSet, Impact};

/// Print the change set to stdout, grouped by impact.
pub fn print_report(change_set: &ChangeSet) {
    println!("=== Semantic Model Changes ===");
    println!();

    for impact in [
        Impact::Destructive,
        Impact::Moderate,
        Impact::Additive,
        Impact::Safe,
    ] {
        let entries: Vec<_> = change_set
            .entries
            .iter()
            .filter(|e| e.impact == impact && e.kind != ChangeKind::Warning)
            .collect();
        if entries.is_empty() {
            continue;
        }
        println!("--- {} ({}) ---", impact, entries.len());
        for entry in entries {
            let scope = entry
                .table
                .as_deref()
                .map(|t| format!("[{t}] "))
                .unwrap_or_default();
            if entry.detail.is_empty() {
                println!("  {scope}{:?}: {}", entry.kind, entry.subject);
            } else {
                println!("  {scope}{:?}: {} ({})", entry.kind, entry.subject, entry.detail);
            }
        }
        println!();
    }

    let warnings: Vec<_> = change_set.warnings().collect();
    if !warnings.is_empty() {
        println!("--- Warnings ({}) ---", warnings.len());
        for warning in warnings {
            println!("  {}", warning.detail);
        }
        println!();
    }

    let preserved = change_set.preserved_measures().count();
    if preserved > 0 {
        println!("{preserved} user measure(s) will be preserved.");
    }
}
