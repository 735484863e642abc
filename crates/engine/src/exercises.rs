//! Exercise matching for exercise-seeking utterances.
//!
//! Exercises are never embedded; they are filtered by the extracted
//! languages and difficulty hint, taken newest first and re-ranked by
//! overlap with the extracted concepts and topics.

use tutorgraph_core::corpus::Exercise;
use tutorgraph_core::keywords::ExtractedKeywords;

/// Up to `k` active exercises for `keywords`.
pub fn match_exercises(keywords: &ExtractedKeywords, exercises: &[Exercise], k: usize) -> Vec<Exercise> {
    let languages: Vec<String> = keywords.languages.iter().map(|l| l.to_lowercase()).collect();

    let mut candidates: Vec<&Exercise> = exercises
        .iter()
        .filter(|e| e.is_active)
        .filter(|e| languages.is_empty() || languages.contains(&e.language.to_lowercase()))
        .filter(|e| keywords.difficulty.is_none_or(|d| e.difficulty == d))
        .collect();

    candidates.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    candidates.truncate(k.saturating_mul(2));

    let terms: Vec<String> = keywords
        .concepts
        .iter()
        .chain(&keywords.topics)
        .map(|t| t.to_lowercase())
        .collect();

    if !terms.is_empty() {
        let mut scored: Vec<(&Exercise, u32)> =
            candidates.into_iter().map(|e| (e, overlap(e, &terms))).collect();
        scored.sort_by(|a, b| b.1.cmp(&a.1));
        candidates = scored.into_iter().map(|(e, _)| e).collect();
    }

    candidates.into_iter().take(k).cloned().collect()
}

fn overlap(exercise: &Exercise, terms: &[String]) -> u32 {
    let text = exercise.text_lower();
    let category = exercise.category.to_lowercase();
    terms
        .iter()
        .map(|term| {
            let mut s = 0;
            if exercise.tags.iter().any(|t| t.eq_ignore_ascii_case(term)) {
                s += 3;
            }
            if text.contains(term.as_str()) {
                s += 2;
            }
            if category == *term {
                s += 1;
            }
            s
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::extract_keywords;
    use chrono::{Duration, Utc};
    use tutorgraph_core::corpus::Difficulty;

    fn exercise(id: &str, language: &str, difficulty: Difficulty, tags: &[&str], age_days: i64) -> Exercise {
        Exercise {
            id: id.into(),
            title: format!("Exercise {id}"),
            description: "Fix the bug".into(),
            language: language.into(),
            difficulty,
            category: "general".into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            points: 10,
            is_active: true,
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    #[test]
    fn easy_javascript_only() {
        let mut inactive = exercise("inactive", "JavaScript", Difficulty::Easy, &[], 0);
        inactive.is_active = false;
        let pool = vec![
            exercise("js-easy-old", "JavaScript", Difficulty::Easy, &[], 9),
            exercise("js-hard", "JavaScript", Difficulty::Hard, &[], 1),
            exercise("py-easy", "Python", Difficulty::Easy, &[], 1),
            exercise("js-easy-new", "JavaScript", Difficulty::Easy, &[], 2),
            inactive,
        ];
        let kw = extract_keywords("gợi ý bài tập javascript dễ");
        let got = match_exercises(&kw, &pool, 5);
        let ids: Vec<_> = got.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["js-easy-new", "js-easy-old"]);
        assert!(got.len() <= 5);
    }

    #[test]
    fn overlap_reorders_within_the_window() {
        let pool = vec![
            exercise("newest", "Python", Difficulty::Medium, &[], 0),
            exercise("loops", "Python", Difficulty::Medium, &["loop"], 3),
        ];
        let kw = ExtractedKeywords {
            concepts: vec!["loop".into()],
            ..Default::default()
        };
        let got = match_exercises(&kw, &pool, 5);
        assert_eq!(got[0].id, "loops");
        assert_eq!(got[1].id, "newest");
    }

    #[test]
    fn window_is_twice_k() {
        let pool: Vec<_> = (0..10)
            .map(|i| exercise(&format!("e{i}"), "Python", Difficulty::Easy, &[], i))
            .collect();
        let kw = ExtractedKeywords::default();
        let got = match_exercises(&kw, &pool, 3);
        let ids: Vec<_> = got.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["e0", "e1", "e2"]);
    }
}
