const PREVIEW_CHARS: usize = 80;

/// Log preview of a payload, cut on a character boundary
pub fn shorten_string(s: &str) -> String {
    match s.char_indices().nth(PREVIEW_CHARS) {
        Some((end, _)) => format!("{}...", &s[..end]),
        None => s.to_string(),
    }
}
