//! Size helper functions.

/// Convert kilobytes to bytes.
#[inline]
pub const fn kb(n: usize) -> usize {
    n * 1024
}

/// Convert megabytes to bytes.
#[inline]
pub const fn mb(n: usize) -> usize {
    n * 1024 * 1024
}

/// Format bytes as a human-readable string; `0` limits print as "unlimited".
pub fn format_limit(bytes: usize) -> String {
    if bytes == 0 {
        return "unlimited".to_string();
    }
    format_bytes(bytes)
}

/// Format bytes as a human-readable string.
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Parse a byte count with an optional `k`/`m`/`g` suffix (case-insensitive).
pub fn parse_bytes(text: &str) -> Option<usize> {
    let text = text.trim();
    let (digits, multiplier) = match text.chars().last()?.to_ascii_lowercase() {
        'k' => (&text[..text.len() - 1], kb(1)),
        'm' => (&text[..text.len() - 1], mb(1)),
        'g' => (&text[..text.len() - 1], mb(1024)),
        _ => (text, 1),
    };
    digits.trim().parse::<usize>().ok()?.checked_mul(multiplier)
}
