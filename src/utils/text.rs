pub fn truncate_utf8_prefix(value: &str, max_bytes: usize) -> String {
    if max_bytes == 0 {
        return String::new();
    }
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

/// Cuts a response body down to a single-line preview suitable for error messages.
pub fn body_preview(body: &str, max_bytes: usize) -> String {
    let flattened: String = body
        .chars()
        .map(|c| if c.is_control() { ' ' } else { c })
        .collect();
    let trimmed = flattened.trim();
    if trimmed.len() <= max_bytes {
        return trimmed.to_string();
    }
    format!("{}...", truncate_utf8_prefix(trimmed, max_bytes))
}

#[cfg(test)]
mod tests {
    use super::{body_preview, truncate_utf8_prefix};

    #[test]
    fn truncate_utf8_prefix_handles_ascii() {
        assert_eq!(truncate_utf8_prefix("hello", 3), "hel");
    }

    #[test]
    fn truncate_utf8_prefix_does_not_split_utf8() {
        assert_eq!(truncate_utf8_prefix("a\u{e9}b", 2), "a");
        assert_eq!(truncate_utf8_prefix("a\u{e9}b", 3), "a\u{e9}");
    }

    #[test]
    fn body_preview_flattens_and_caps() {
        assert_eq!(body_preview("  line1\nline2 ", 64), "line1 line2");
        assert_eq!(body_preview("abcdef", 3), "abc...");
    }
}
