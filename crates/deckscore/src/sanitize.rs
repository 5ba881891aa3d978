//! Helpers for sanitizing data before it reaches disk, logs or span attributes.
//!
//! Upload names come straight from the client and model replies can be
//! arbitrarily long, so both pass through here first.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

/// Longest upstream body or model reply echoed into an error message.
pub const MAX_ECHOED_BODY: usize = 200;

/// Longest file name kept after sanitizing (excluding the uuid prefix).
const MAX_FILENAME_LEN: usize = 120;

/// Returns only the filename component of a path (no directory).
///
/// Safe for span fields, reveals the file name without exposing the upload directory.
pub fn redact_path(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("<unknown>")
        .to_string()
}

static RE_UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").unwrap());

/// Reduces a client-supplied file name to a safe single path component.
///
/// Directory parts are dropped, runs of unsafe characters collapse to `_`,
/// and leading dots are stripped so the result can never be `..` or hidden.
/// Returns `None` when nothing usable remains.
pub fn sanitize_filename(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let replaced = RE_UNSAFE_CHARS.replace_all(base, "_");
    let trimmed = replaced.trim_start_matches('.').trim_matches('_');
    if trimmed.is_empty() {
        return None;
    }

    if trimmed.chars().count() <= MAX_FILENAME_LEN {
        return Some(trimmed.to_string());
    }

    // Keep the extension when truncating so format detection still works.
    match trimmed.rfind('.') {
        Some(dot) if trimmed.len() - dot <= 10 => {
            let ext = &trimmed[dot..];
            let stem: String = trimmed[..dot]
                .chars()
                .take(MAX_FILENAME_LEN - ext.len())
                .collect();
            Some(format!("{}{}", stem, ext))
        }
        _ => Some(trimmed.chars().take(MAX_FILENAME_LEN).collect()),
    }
}

/// Truncates text for inclusion in an error message or log line.
pub fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let head: String = text.chars().take(max_chars).collect();
        format!("{}... (truncated)", head)
    } else {
        text.to_string()
    }
}
