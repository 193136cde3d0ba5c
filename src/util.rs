//! Shared utility helpers.

use uuid::Uuid;

/// Case-insensitive substring search without allocating an uppercase copy.
#[inline]
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    let needle_bytes = needle.as_bytes();
    let haystack_bytes = haystack.as_bytes();
    if needle_bytes.len() > haystack_bytes.len() {
        return false;
    }
    haystack_bytes
        .windows(needle_bytes.len())
        .any(|window| window.eq_ignore_ascii_case(needle_bytes))
}

/// Case-insensitive string equality.
#[inline]
pub fn eq_ci(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Mint a fresh GUID in lowercase `8-4-4-4-12` hex form.
///
/// Every GUID the generator writes (lineage tags, relationship names,
/// platform logical IDs) goes through here.
pub fn fresh_guid() -> String {
    Uuid::new_v4().to_string()
}

/// Normalise any line-ending convention to bare LF.
///
/// All TMDL read from disk passes through this before parsing; emission is
/// LF-internal and converted back with [`to_crlf`] at write time.
pub fn to_lf(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

/// Convert LF-internal text to the CRLF convention TMDL files use on disk.
pub fn to_crlf(text: &str) -> String {
    let lf = to_lf(text);
    lf.replace('\n', "\r\n")
}

/// Strip a UTF-8 byte-order mark, if present.
pub fn strip_bom(text: &str) -> &str {
    text.strip_prefix('\u{feff}').unwrap_or(text)
}

/// Replace filename-invalid characters in a display name with `_`.
///
/// The result is used as the table file stem under `definition/tables/`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if (c as u32) < 0x20 => '_',
            c => c,
        })
        .collect()
}

/// Strip an `https://` (or `http://`) scheme prefix for URL comparison.
pub fn strip_url_scheme(url: &str) -> &str {
    let trimmed = url.trim();
    if let Some(rest) = trimmed.strip_prefix("https://") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("http://") {
        rest
    } else {
        trimmed
    }
}
