//! Shared text helpers used by the compiler and validators.

/// Approximate characters per token used for budget estimates.
pub const CHARS_PER_TOKEN: usize = 4;

/// Estimate the token count of `text` at ~4 characters per token.
///
/// Counts characters, not bytes, and rounds up so that any non-empty
/// text costs at least one token.
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count().div_ceil(CHARS_PER_TOKEN)
}

/// Cut `s` to at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Keep the first `max_lines` lines of `s`.
///
/// Returns the kept text and the number of lines dropped.
pub fn head_lines(s: &str, max_lines: usize) -> (String, usize) {
    let total = s.lines().count();
    if total <= max_lines {
        return (s.to_string(), 0);
    }
    let kept: Vec<&str> = s.lines().take(max_lines).collect();
    (kept.join("\n"), total - max_lines)
}

/// Arithmetic mean, `0.0` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_rounds_up() {
        assert_eq!(estimate_tokens(""), 0);
        assert_eq!(estimate_tokens("abc"), 1);
        assert_eq!(estimate_tokens("abcd"), 1);
        assert_eq!(estimate_tokens("abcde"), 2);
    }

    #[test]
    fn estimate_counts_chars_not_bytes() {
        // 4 multibyte characters, 12 bytes
        assert_eq!(estimate_tokens("あのねえ"), 1);
    }

    #[test]
    fn truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("hello world", 5), "hello");
        assert_eq!(truncate_chars("hi", 10), "hi");
        assert_eq!(truncate_chars("あのね", 2), "あの");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn head_lines_reports_dropped() {
        let (kept, dropped) = head_lines("a\nb\nc\nd", 2);
        assert_eq!(kept, "a\nb");
        assert_eq!(dropped, 2);

        let (kept, dropped) = head_lines("a\nb", 5);
        assert_eq!(kept, "a\nb");
        assert_eq!(dropped, 0);
    }

    #[test]
    fn mean_of_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert!((mean(&[0.9, 0.7]) - 0.8).abs() < 1e-9);
    }
}
