//! Name normalization for legacy volume entries

use unicode_normalization::UnicodeNormalization;

/// Longest name (in bytes) the legacy filesystem can store
pub const MAX_NAME_LEN: usize = 31;

/// Normalize a single path segment so that it can be stored on the volume
///
/// This function:
/// 1. Replaces `:` with `/` (the extractor escapes the legacy path separator as `:`)
/// 2. Normalizes Unicode to NFC (only composed characters have single-byte equivalents)
/// 3. Truncates to at most 31 bytes, never splitting a character
pub fn normalize_name(name: &str) -> String {
    let composed: String = name.replace(':', "/").nfc().collect();
    truncate_to_boundary(composed, MAX_NAME_LEN)
}

/// Normalize every segment of a `/`-separated relative path, keeping the separators
pub fn normalize_relative_path(path: &str) -> String {
    path.split('/')
        .map(|segment| segment.replace(':', "/").nfc().collect::<String>())
        .collect::<Vec<_>>()
        .join("/")
}

fn truncate_to_boundary(mut name: String, max_len: usize) -> String {
    if name.len() > max_len {
        let mut end = max_len;
        while !name.is_char_boundary(end) {
            end -= 1;
        }
        name.truncate(end);
    }
    name
}
