//! Utility module for common functionality

use once_cell::sync::Lazy;
use regex::Regex;

static SENSITIVE_PATTERNS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    [
        (r"Bearer [A-Za-z0-9\-_.]+", "Bearer [REDACTED]"),
        (r"(?i)api[_-]?key[=:]\s*[A-Za-z0-9\-_]+", "api_key=[REDACTED]"),
        (r"\bsk-[A-Za-z0-9\-_]{8,}", "[REDACTED]"),
    ]
    .into_iter()
    .filter_map(|(pattern, replacement)| Regex::new(pattern).ok().map(|re| (re, replacement)))
    .collect()
});

/// Generate a unique correlation id for one orchestrated call
pub fn generate_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Truncate a string to at most `max_chars` characters, adding an ellipsis if truncated
pub fn truncate_string(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    if max_chars <= 3 {
        return s.chars().take(max_chars).collect();
    }
    let kept: String = s.chars().take(max_chars - 3).collect();
    format!("{}...", kept)
}

/// Redact credentials that upstream error messages sometimes echo back
pub fn sanitize_for_logging(s: &str) -> String {
    SENSITIVE_PATTERNS
        .iter()
        .fold(s.to_string(), |acc, (re, replacement)| {
            re.replace_all(&acc, *replacement).into_owned()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_string() {
        assert_eq!(truncate_string("short", 10), "short");
        assert_eq!(truncate_string("a longer sentence", 8), "a lon...");
        assert_eq!(truncate_string("héllo wörld", 5), "hé...");
        assert_eq!(truncate_string("abcdef", 2), "ab");
    }

    #[test]
    fn test_sanitize_for_logging() {
        let cleaned = sanitize_for_logging("401: invalid api key sk-abcdef123456 (Bearer abc.def)");
        assert!(!cleaned.contains("sk-abcdef123456"));
        assert!(!cleaned.contains("abc.def"));
        assert!(cleaned.contains("[REDACTED]"));
    }

    #[test]
    fn test_correlation_ids_differ() {
        assert_ne!(generate_correlation_id(), generate_correlation_id());
    }
}
