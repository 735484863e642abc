//! Exemplar promotion from positively rated conversation turns.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use tutorgraph_core::corpus::{Exemplar, NewExemplar};
use tutorgraph_core::error::StoreError;
use tutorgraph_core::event::{DomainEvent, EventBus};
use tutorgraph_core::store::KnowledgeStore;

pub const MIN_QUESTION_CHARS: usize = 10;
pub const MIN_ANSWER_CHARS: usize = 20;
const PROMOTED_PRIORITY: i32 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Good,
    Bad,
}

/// A question/answer turn rated by the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatedTurn {
    pub question: String,
    pub answer: String,
    pub rating: Rating,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "exemplar", rename_all = "snake_case")]
pub enum PromotionOutcome {
    Created(Exemplar),
    SkippedTooShort,
    SkippedDuplicate,
    SkippedNotPositive,
}

/// Category rules, checked in order against the lowercased question.
const CATEGORY_RULES: &[(&str, &[&str])] = &[
    ("react", &["react", "usestate", "useeffect"]),
    ("javascript", &["javascript", "js"]),
    ("debugging", &["debug", "lỗi", "error"]),
    ("bughunter", &["bughunter", "submit"]),
];
const DEFAULT_CATEGORY: &str = "general";

/// Tag vocabulary, matched against the lowercased question and answer.
const TAG_KEYWORDS: &[&str] = &[
    "javascript", "react", "node", "python", "java", "typescript",
    "usestate", "useeffect", "hooks", "async", "await", "promise",
    "debug", "error", "console", "api", "fetch", "json",
    "array", "object", "function", "component", "state", "props",
    "bughunter", "submit", "challenge", "code", "fix", "bug",
];
const MAX_TAGS: usize = 10;

/// Category of a promoted question: the first rule with a substring hit.
pub fn promoted_category(question: &str) -> &'static str {
    let lower = question.to_lowercase();
    CATEGORY_RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| lower.contains(n)))
        .map_or(DEFAULT_CATEGORY, |(category, _)| category)
}

/// Vocabulary words found anywhere in the question or answer, in
/// vocabulary order, at most [`MAX_TAGS`].
pub fn promoted_tags(question: &str, answer: &str) -> Vec<String> {
    let text = format!("{question} {answer}").to_lowercase();
    TAG_KEYWORDS
        .iter()
        .filter(|k| text.contains(*k))
        .take(MAX_TAGS)
        .map(|k| k.to_string())
        .collect()
}

/// The exemplar a promoted turn becomes.
pub fn draft_exemplar(question: &str, answer: &str) -> NewExemplar {
    NewExemplar::new(question, answer)
        .with_category(promoted_category(question))
        .with_tags(promoted_tags(question, answer))
        .with_priority(PROMOTED_PRIORITY)
}

pub struct Promoter {
    store: Arc<dyn KnowledgeStore>,
    events: Arc<EventBus>,
}

impl Promoter {
    pub fn new(store: Arc<dyn KnowledgeStore>, events: Arc<EventBus>) -> Self {
        Self { store, events }
    }

    pub async fn promote(&self, turn: &RatedTurn) -> Result<PromotionOutcome, StoreError> {
        if turn.rating != Rating::Good {
            return Ok(PromotionOutcome::SkippedNotPositive);
        }

        let question = turn.question.trim();
        let answer = turn.answer.trim();
        if question.chars().count() < MIN_QUESTION_CHARS || answer.chars().count() < MIN_ANSWER_CHARS {
            debug!(
                question_chars = question.chars().count(),
                answer_chars = answer.chars().count(),
                "Turn too short to promote"
            );
            return Ok(PromotionOutcome::SkippedTooShort);
        }

        if self.store.find_by_question(question).await?.is_some() {
            debug!("Question already stored, skipping promotion");
            return Ok(PromotionOutcome::SkippedDuplicate);
        }

        let created = self.store.insert_exemplar(draft_exemplar(question, answer)).await?;
        info!(
            exemplar_id = %created.id,
            category = %created.category,
            user_id = turn.user_id.as_deref().unwrap_or("-"),
            "Promoted rated turn to exemplar"
        );
        self.events.publish(DomainEvent::exemplars_changed("promotion", 1));
        Ok(PromotionOutcome::Created(created))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutorgraph_store::InMemoryStore;

    fn turn(question: &str, answer: &str, rating: Rating) -> RatedTurn {
        RatedTurn {
            question: question.into(),
            answer: answer.into(),
            rating,
            user_id: Some("u1".into()),
        }
    }

    fn promoter() -> (Promoter, Arc<InMemoryStore>, Arc<EventBus>) {
        let store = Arc::new(InMemoryStore::new());
        let bus = Arc::new(EventBus::default());
        (Promoter::new(store.clone(), bus.clone()), store, bus)
    }

    const ANSWER: &str = "Recursion is a function calling itself with a base case.";

    #[tokio::test]
    async fn good_turn_is_promoted_and_announced() {
        let (p, store, bus) = promoter();
        let mut rx = bus.subscribe();

        let outcome = p
            .promote(&turn("What is recursion in Python?", ANSWER, Rating::Good))
            .await
            .unwrap();
        let PromotionOutcome::Created(e) = outcome else {
            panic!("expected creation, got {outcome:?}");
        };
        assert_eq!(e.category, "general");
        assert_eq!(e.priority, 5);
        assert_eq!(e.usage_count, 0);
        assert_eq!(e.tags, vec!["python", "function"]);
        assert_eq!(store.count_active().await.unwrap(), 1);

        let event = rx.recv().await.unwrap();
        assert!(matches!(&*event, DomainEvent::ExemplarsChanged { count: 1, .. }));
    }

    #[tokio::test]
    async fn short_turns_are_skipped() {
        let (p, store, _) = promoter();
        let short_q = p.promote(&turn("Recursion", ANSWER, Rating::Good)).await.unwrap();
        assert_eq!(short_q, PromotionOutcome::SkippedTooShort);
        let short_a = p
            .promote(&turn("What is recursion?", "  It calls itself.  ", Rating::Good))
            .await
            .unwrap();
        assert_eq!(short_a, PromotionOutcome::SkippedTooShort);
        assert_eq!(store.count_active().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn identical_question_is_a_duplicate() {
        let (p, store, _) = promoter();
        store
            .insert_exemplar(NewExemplar::new("What is recursion?", "old answer").inactive())
            .await
            .unwrap();
        let outcome = p
            .promote(&turn("What is recursion?", ANSWER, Rating::Good))
            .await
            .unwrap();
        assert_eq!(outcome, PromotionOutcome::SkippedDuplicate);
    }

    #[tokio::test]
    async fn bad_rating_never_promotes() {
        let (p, store, _) = promoter();
        let outcome = p
            .promote(&turn("What is recursion in Python?", ANSWER, Rating::Bad))
            .await
            .unwrap();
        assert_eq!(outcome, PromotionOutcome::SkippedNotPositive);
        assert_eq!(store.count_active().await.unwrap(), 0);
    }

    #[test]
    fn error_questions_become_debugging_exemplars() {
        let draft = draft_exemplar("How do I fix this syntax error bug?", ANSWER);
        assert_eq!(draft.category, "debugging");
        assert_eq!(draft.tags, vec!["error", "function", "fix", "bug"]);
    }

    #[test]
    fn react_questions_are_tagged_from_question_and_answer() {
        let draft = draft_exemplar(
            "How does useState work in react?",
            "It returns the current value and a setter for the component.",
        );
        assert_eq!(draft.category, "react");
        assert_eq!(draft.priority, 5);
        assert_eq!(draft.tags, vec!["react", "usestate", "component", "state"]);
    }

    #[test]
    fn categories_follow_rule_order() {
        // react outranks javascript, javascript outranks debugging
        assert_eq!(promoted_category("React hooks in JavaScript"), "react");
        assert_eq!(promoted_category("Why does my JS code throw an error?"), "javascript");
        assert_eq!(promoted_category("Lỗi khi chạy vòng lặp"), "debugging");
        assert_eq!(promoted_category("How do I submit my answer?"), "bughunter");
        assert_eq!(promoted_category("What is recursion?"), "general");
    }

    #[test]
    fn tags_are_capped() {
        let tags = promoted_tags(
            "javascript react node python typescript hooks async promise",
            "debug error console api fetch json array",
        );
        assert_eq!(tags.len(), 10);
        assert_eq!(tags[0], "javascript");
        assert!(tags.contains(&"java".to_string()));
    }
}
