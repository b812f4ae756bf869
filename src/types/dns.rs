// ABOUTME: DNS-1123 name sanitizers for cluster object names.
// ABOUTME: Lowercases, replaces invalid characters, trims and truncates.

const MAX_SUBDOMAIN: usize = 253;
const MAX_LABEL: usize = 63;

/// Sanitize into a DNS-1123 subdomain: `[a-z0-9.-]`, alphanumeric at both
/// ends, at most 253 characters.
pub fn sanitize_subdomain(name: &str) -> String {
    sanitize(name, MAX_SUBDOMAIN, |c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.'
    })
}

/// Sanitize into a DNS-1123 label: `[a-z0-9-]`, alphanumeric at both ends,
/// at most 63 characters.
pub fn sanitize_label(name: &str) -> String {
    sanitize(name, MAX_LABEL, |c| {
        c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-'
    })
}

fn sanitize(name: &str, max: usize, allowed: impl Fn(char) -> bool) -> String {
    let replaced: String = name
        .to_lowercase()
        .chars()
        .map(|c| if allowed(c) { c } else { '-' })
        .collect();

    let mut trimmed: String = replaced
        .trim_matches(|c: char| c == '-' || c == '.')
        .chars()
        .take(max)
        .collect();

    // Truncation may leave a separator at the end.
    while trimmed.ends_with(['-', '.']) {
        trimmed.pop();
    }
    trimmed
}
