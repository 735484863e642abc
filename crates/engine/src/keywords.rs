//! Keyword and intent extraction.
//!
//! Every category is tagged by case-insensitive substring containment
//! against a fixed alias list (English and Vietnamese). Matching is not
//! token-bounded, so "for" also fires inside "format". The one exception is
//! language detection: a language whose every hit sits inside a longer hit
//! of another language is dropped, so "javascript" does not also yield Java.

use std::ops::Range;
use tutorgraph_core::corpus::Difficulty;
use tutorgraph_core::keywords::{ExtractedKeywords, Intent};

type Aliases = (&'static str, &'static [&'static str]);

const CONCEPTS: &[Aliases] = &[
    ("array", &["array", "mảng", "list", "danh sách"]),
    ("function", &["function", "hàm", "method", "phương thức"]),
    ("object", &["object", "đối tượng", "class", "lớp"]),
    ("loop", &["loop", "vòng lặp", "for", "while", "foreach"]),
    ("condition", &["if", "else", "condition", "điều kiện"]),
    ("variable", &["variable", "biến", "var", "let", "const"]),
    ("string", &["string", "chuỗi", "text"]),
    ("number", &["number", "số", "integer", "float"]),
    ("boolean", &["boolean", "bool", "true", "false"]),
    ("recursion", &["recursion", "đệ quy", "recursive"]),
    ("closure", &["closure", "đóng"]),
    ("promise", &["promise", "async", "await", "asynchronous"]),
    ("generator", &["generator", "yield"]),
    ("decorator", &["decorator", "decorator pattern"]),
    ("class", &["class", "lớp", "object-oriented", "oop"]),
    ("inheritance", &["inheritance", "kế thừa", "extends"]),
    ("polymorphism", &["polymorphism", "đa hình"]),
    ("encapsulation", &["encapsulation", "đóng gói"]),
    ("algorithm", &["algorithm", "thuật toán", "algo"]),
    (
        "data-structure",
        &["data structure", "cấu trúc dữ liệu", "stack", "queue", "tree", "graph"],
    ),
    ("sorting", &["sort", "sắp xếp", "quicksort", "mergesort"]),
    ("searching", &["search", "tìm kiếm", "binary search", "linear search"]),
];

const LANGUAGES: &[Aliases] = &[
    ("Python", &["python", "py"]),
    ("JavaScript", &["javascript", "js", "nodejs", "node.js"]),
    ("Java", &["java"]),
    ("C++", &["c++", "cpp", "cplusplus"]),
    ("C#", &["c#", "csharp", "c-sharp"]),
    ("C", &["c language", "c programming"]),
];

const ERROR_TYPES: &[Aliases] = &[
    ("syntax", &["syntax error", "lỗi cú pháp", "syntax"]),
    ("runtime", &["runtime error", "lỗi runtime", "runtime"]),
    ("logic", &["logic error", "lỗi logic", "logic"]),
    ("type", &["typeerror", "type error", "lỗi kiểu"]),
    ("reference", &["referenceerror", "reference error", "undefined", "null"]),
    ("index", &["indexerror", "index error", "out of range"]),
    ("key", &["keyerror", "key error"]),
    ("attribute", &["attributeerror", "attribute error"]),
    ("indentation", &["indentationerror", "indentation error", "indent"]),
    ("name", &["nameerror", "name error", "not defined"]),
    ("zero-division", &["zerodivisionerror", "division by zero", "chia cho 0"]),
    ("timeout", &["timeout", "timeout error"]),
    ("memory", &["memory error", "out of memory"]),
    ("performance", &["performance", "slow", "chậm"]),
];

const TOPICS: &[Aliases] = &[
    ("debug", &["debug", "sửa lỗi", "fix", "troubleshoot", "gỡ lỗi"]),
    ("algorithm", &["algorithm", "thuật toán", "algo"]),
    ("data-structure", &["data structure", "cấu trúc dữ liệu"]),
    (
        "best-practices",
        &["best practice", "tốt nhất", "clean code", "code quality"],
    ),
    ("testing", &["test", "testing", "unit test", "pytest", "jest"]),
    ("git", &["git", "version control", "github"]),
    ("optimization", &["optimize", "tối ưu", "performance"]),
    ("learning", &["học", "learn", "tutorial", "hướng dẫn"]),
    ("exercise", &["bài tập", "exercise", "challenge", "practice"]),
];

const INTENT_CUES: &[(Intent, &[&str])] = &[
    (
        Intent::Question,
        &[
            "là gì",
            "what is",
            "giải thích",
            "explain",
            "tại sao",
            "why",
            "như thế nào",
            "how",
        ],
    ),
    (
        Intent::Exercise,
        &[
            "bài tập",
            "exercise",
            "challenge",
            "gợi ý",
            "suggest",
            "recommend",
            "bài nào",
        ],
    ),
    (
        Intent::Error,
        &["lỗi", "error", "bug", "sai", "fix", "sửa", "debug"],
    ),
    (
        Intent::Learning,
        &["học", "learn", "tutorial", "course", "lộ trình", "roadmap"],
    ),
    (Intent::General, &["hello", "xin chào", "help", "giúp"]),
];

/// Difficulty cues, checked in this order; the first level with a hit wins.
const DIFFICULTY_CUES: &[(Difficulty, &[&str])] = &[
    (Difficulty::Easy, &["dễ", "easy", "cơ bản", "basic"]),
    (Difficulty::Medium, &["trung bình", "medium", "vừa"]),
    (Difficulty::Hard, &["khó", "hard", "nâng cao", "advanced"]),
];

/// Tag an utterance. Pure and infallible.
pub fn extract_keywords(message: &str) -> ExtractedKeywords {
    let lower = message.to_lowercase();

    let raw_tokens = lower
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect();

    ExtractedKeywords {
        concepts: matching_labels(&lower, CONCEPTS),
        languages: detect_languages(&lower),
        error_types: matching_labels(&lower, ERROR_TYPES),
        topics: matching_labels(&lower, TOPICS),
        intent: detect_intent(&lower),
        difficulty: detect_difficulty(&lower),
        raw_tokens,
    }
}

fn matching_labels(lower: &str, table: &[Aliases]) -> Vec<String> {
    table
        .iter()
        .filter(|(_, aliases)| aliases.iter().any(|a| lower.contains(a)))
        .map(|(label, _)| label.to_string())
        .collect()
}

fn hits(lower: &str, aliases: &[&str]) -> Vec<Range<usize>> {
    aliases
        .iter()
        .flat_map(|alias| {
            lower
                .match_indices(alias)
                .map(move |(start, m)| start..start + m.len())
        })
        .collect()
}

fn detect_languages(lower: &str) -> Vec<String> {
    let spans: Vec<Vec<Range<usize>>> = LANGUAGES
        .iter()
        .map(|(_, aliases)| hits(lower, aliases))
        .collect();

    let shadowed = |lang: usize, span: &Range<usize>| {
        spans.iter().enumerate().any(|(other, others)| {
            other != lang
                && others.iter().any(|o| {
                    o.len() > span.len() && o.start <= span.start && span.end <= o.end
                })
        })
    };

    LANGUAGES
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            let own = &spans[*i];
            !own.is_empty() && !own.iter().all(|s| shadowed(*i, s))
        })
        .map(|(_, (label, _))| label.to_string())
        .collect()
}

/// The intent with the strictly highest cue count; ties keep the earlier
/// leader, and no cues at all means `General`.
fn detect_intent(lower: &str) -> Intent {
    let mut best = Intent::General;
    let mut best_count = 0;
    for (intent, cues) in INTENT_CUES {
        let count = cues.iter().filter(|c| lower.contains(*c)).count();
        if count > best_count {
            best_count = count;
            best = *intent;
        }
    }
    best
}

fn detect_difficulty(lower: &str) -> Option<Difficulty> {
    DIFFICULTY_CUES
        .iter()
        .find(|(_, cues)| cues.iter().any(|c| lower.contains(c)))
        .map(|(level, _)| *level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recursion_question_in_python() {
        let kw = extract_keywords("what is recursion in python");
        assert_eq!(kw.concepts, vec!["recursion"]);
        assert_eq!(kw.languages, vec!["Python"]);
        assert_eq!(kw.intent, Intent::Question);
        assert!(kw.error_types.is_empty());
        assert_eq!(kw.raw_tokens, vec!["what", "recursion", "python"]);
        assert_eq!(kw.difficulty, None);
    }

    #[test]
    fn vietnamese_exercise_request() {
        let kw = extract_keywords("gợi ý bài tập javascript dễ");
        assert_eq!(kw.intent, Intent::Exercise);
        assert_eq!(kw.languages, vec!["JavaScript"]);
        assert_eq!(kw.difficulty, Some(Difficulty::Easy));
        assert!(kw.topics.contains(&"exercise".to_string()));
        assert!(kw.wants_exercises());
    }

    #[test]
    fn java_alone_is_still_java() {
        let kw = extract_keywords("NullPointerException in Java");
        assert_eq!(kw.languages, vec!["Java"]);
        assert!(kw.error_types.contains(&"reference".to_string()));
    }

    #[test]
    fn java_and_javascript_together() {
        let kw = extract_keywords("java vs javascript");
        assert_eq!(kw.languages, vec!["JavaScript", "Java"]);
    }

    #[test]
    fn error_intent_beats_single_question_cue() {
        // "fix", "error", "bug" vs "why"
        let kw = extract_keywords("why does this bug need a fix? syntax error");
        assert_eq!(kw.intent, Intent::Error);
        assert_eq!(kw.error_types, vec!["syntax"]);
        assert!(kw.topics.contains(&"debug".to_string()));
    }

    #[test]
    fn tie_keeps_general() {
        let kw = extract_keywords("zzz qqq");
        assert_eq!(kw.intent, Intent::General);
        assert!(kw.concepts.is_empty());
        assert!(kw.languages.is_empty());
        assert!(kw.topics.is_empty());
    }

    #[test]
    fn substring_matching_is_not_token_bounded() {
        // "for" inside "format"
        let kw = extract_keywords("format output");
        assert!(kw.concepts.contains(&"loop".to_string()));
    }

    #[test]
    fn easy_wins_over_hard_when_both_present() {
        let kw = extract_keywords("easy or hard exercise");
        assert_eq!(kw.difficulty, Some(Difficulty::Easy));
    }

    #[test]
    fn empty_message_has_empty_lists() {
        let kw = extract_keywords("");
        assert!(kw.raw_tokens.is_empty());
        assert_eq!(kw.intent, Intent::General);
        assert_eq!(kw.difficulty, None);
    }
}
