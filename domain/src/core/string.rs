//! String utilities for the domain layer.

/// Truncate a string to a maximum length with ellipsis (UTF-8 safe)
///
/// Uses byte length for max_len but ensures truncation occurs at valid
/// UTF-8 character boundaries.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        s.to_string()
    } else {
        let target = max_len.saturating_sub(3);
        let mut end = target.min(s.len());
        while end > 0 && !s.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &s[..end])
    }
}

/// Remove a leading and trailing markdown code fence from model output.
///
/// Handles ```` ``` ```` and ```` ```lang ```` openers. Inner fences are left
/// untouched; only the outermost wrapper is stripped.
pub fn strip_code_fences(s: &str) -> String {
    let mut text = s.trim();

    if let Some(rest) = text.strip_prefix("```") {
        // Drop the language tag (rest of the opening line)
        text = match rest.find('\n') {
            Some(idx) => &rest[idx + 1..],
            None => rest,
        };
    }

    if let Some(rest) = text.trim_end().strip_suffix("```") {
        text = rest;
    }

    text.trim().to_string()
}

/// Convert a free-text name into an identifier slug.
///
/// Lowercases, maps every run of non-alphanumeric characters to a single
/// underscore, and trims underscores at both ends.
pub fn slugify(s: &str) -> String {
    let mut slug = String::with_capacity(s.len());
    let mut pending_sep = false;

    for c in s.chars() {
        if c.is_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('_');
            }
            pending_sep = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_sep = true;
        }
    }

    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_ascii() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world", 8), "hello...");
    }

    #[test]
    fn test_truncate_multibyte() {
        // 'の' is 3 bytes; target=4 backs up to the boundary at 3
        assert_eq!(truncate("あのね", 7), "あ...");
        assert_eq!(truncate("あのね", 9), "あのね");
    }

    #[test]
    fn test_strip_code_fences_with_language() {
        let raw = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(raw), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_code_fences_plain() {
        let raw = "  ```\nYou are the Momentum Trader.\n```  ";
        assert_eq!(strip_code_fences(raw), "You are the Momentum Trader.");
    }

    #[test]
    fn test_strip_code_fences_without_fences() {
        assert_eq!(strip_code_fences("  plain text \n"), "plain text");
    }

    #[test]
    fn test_strip_code_fences_keeps_inner_fences() {
        let raw = "Intro\n```json\n{}\n```\nOutro";
        assert_eq!(strip_code_fences(raw), raw);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Momentum Trader"), "momentum_trader");
        assert_eq!(slugify("  News -- Sentiment Analyst! "), "news_sentiment_analyst");
        assert_eq!(slugify("risk_manager"), "risk_manager");
        assert_eq!(slugify("!!!"), "");
    }
}
