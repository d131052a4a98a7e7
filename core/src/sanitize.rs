//! Cleanup applied to free text before it is stored in a deal custom field.

/// Characters Pipedrive's custom text fields mangle. Removed outright.
const BLACKLIST: [char; 2] = ['\u{201C}', '\u{201D}'];

/// Strip ASCII control characters (U+0000..=U+001F and U+007F, newlines
/// included) and the curly double quotes. Everything else is kept verbatim.
pub fn sanitize_message(message: &str) -> String {
    message
        .chars()
        .filter(|c| !is_low(*c) && !BLACKLIST.contains(c))
        .collect()
}

fn is_low(c: char) -> bool {
    c <= '\u{1F}' || c == '\u{7F}'
}
