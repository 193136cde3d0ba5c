//! TMDL identifier quoting.

/// True when `s` can stand unquoted in TMDL: `[A-Za-z_][A-Za-z0-9_]*`.
pub fn needs_quoting(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return true,
    }
    chars.any(|c| !c.is_ascii_alphanumeric() && c != '_')
}

/// Quote an identifier for TMDL when required, doubling internal quotes.
pub fn quote(s: &str) -> String {
    if needs_quoting(s) {
        format!("'{}'", s.replace('\'', "''"))
    } else {
        s.to_string()
    }
}

/// Undo [`quote`]: strip one level of single quotes and collapse doubled
/// internal quotes. Unquoted input is returned trimmed.
pub fn unquote(s: &str) -> String {
    let trimmed = s.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('\'') && trimmed.ends_with('\'') {
        trimmed[1..trimmed.len() - 1].replace("''", "'")
    } else {
        trimmed.to_string()
    }
}
