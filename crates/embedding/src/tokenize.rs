//! Token normalization shared by the embedding path and the corpus export.

use once_cell::sync::Lazy;
use regex_lite::Regex;

/// English and Vietnamese function words dropped before embedding.
pub const STOPWORDS: &[&str] = &[
    "là", "cái", "tôi", "bạn", "có", "không", "gì", "nào", "được", "cách", "sao", "làm", "hỏi",
    "muốn", "cần", "nó", "nên", "thì", "này", "kia", "ở", "đó", "đây", "và", "hay", "hay là",
    "hoặc", "nhưng", "mà", "vì", "cho", "để", "nếu", "khi", "giống", "như", "cũng", "lại", "chỉ",
    "khoảng", "từ", "đến", "với", "trong", "trên", "dưới", "sau", "trước", "a", "an", "the",
    "is", "are", "was", "were", "be", "been", "have", "has", "do", "does",
];

static FENCED_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```[\s\S]*?```").expect("valid fenced code regex"));
static INLINE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"`[^`]+`").expect("valid inline code regex"));
static BOLD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*([^*]+)\*\*").expect("valid bold regex"));
static ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+)\*").expect("valid italic regex"));

/// Lowercase, strip code and emphasis, split on anything that is not a
/// letter, digit or underscore, and keep non-stopword words longer than one
/// character.
pub fn normalize_tokens(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let text = FENCED_CODE.replace_all(text, "");
    let text = INLINE_CODE.replace_all(&text, "");
    let text = BOLD.replace_all(&text, "$1");
    let text = ITALIC.replace_all(&text, "$1");

    let cleaned: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|w| w.chars().count() > 1)
        .filter(|w| !STOPWORDS.contains(w))
        .map(str::to_string)
        .collect()
}

/// First `max_chars` characters of `text`, respecting char boundaries.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_stopwords_and_short_words() {
        let tokens = normalize_tokens("What is a closure in Rust?");
        assert_eq!(tokens, vec!["what", "closure", "in", "rust"]);
    }

    #[test]
    fn strips_code_and_keeps_emphasis_text() {
        let tokens = normalize_tokens("Use **map** and `iter()` here:\n```rust\nlet x = 1;\n```\ndone");
        assert_eq!(tokens, vec!["use", "map", "and", "here", "done"]);
    }

    #[test]
    fn keeps_vietnamese_letters() {
        let tokens = normalize_tokens("Đệ quy là gì trong python?");
        assert_eq!(tokens, vec!["đệ", "quy", "python"]);
    }

    #[test]
    fn empty_input_has_no_tokens() {
        assert!(normalize_tokens("   ").is_empty());
        assert!(normalize_tokens("? ! ,").is_empty());
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        assert_eq!(truncate_chars("đệ quy", 2), "đệ");
        assert_eq!(truncate_chars("abc", 10), "abc");
    }
}
