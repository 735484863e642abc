//! Context assembly: the single entry point for the conversational layer.
//!
//! Sequence for one utterance:
//!
//! 1. Keyword/intent extraction
//! 2. Exemplar ranking (vector or keyword path)
//! 3. Exercise matching, when the user is looking for exercises
//! 4. Error remediation, when error types were mentioned by a known user
//! 5. Suggested topics
//!
//! The whole sequence runs under a hard deadline. On timeout or a non-fatal
//! failure the assembler falls back to a keyword-only context under its own
//! deadline, and if that also runs out, to the bare keywords. Degradation is
//! flagged on the result, never raised. Only an unreachable store is an error.
//!
//! Usage counters are bumped once per call, for the exemplars that end up in
//! the returned context, whichever path produced them.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use tutorgraph_config::{AssistantConfig, RetrievalConfig};
use tutorgraph_core::corpus::{Exemplar, Exercise};
use tutorgraph_core::error::StoreError;
use tutorgraph_core::event::{DomainEvent, EventBus};
use tutorgraph_core::keywords::ExtractedKeywords;
use tutorgraph_core::store::KnowledgeStore;
use tutorgraph_embedding::truncate_chars;

use crate::exercises::match_exercises;
use crate::keywords::extract_keywords;
use crate::ranker::{keyword_fallback, record_usage, ScoredExemplar, SimilarityRanker};
use crate::recommender::remediation;
use crate::token::estimate_tokens;

const SUGGESTED_TOPICS: usize = 5;
const DESCRIPTION_CHARS: usize = 200;
const MIN_MESSAGE_TOKEN_CHARS: usize = 4;

// ── Types ─────────────────────────────────────────────────────────────────

/// Everything retrieved for one utterance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponseContext {
    pub exemplars: Vec<ScoredExemplar>,
    pub exercises: Vec<Exercise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_based_recommendations: Option<Vec<Exemplar>>,
    pub keywords: ExtractedKeywords,
    pub suggested_topics: Vec<String>,
}

impl ResponseContext {
    /// A context carrying only the extracted keywords.
    pub fn keywords_only(keywords: ExtractedKeywords) -> Self {
        let suggested_topics = keywords.suggested_topics(SUGGESTED_TOPICS);
        Self {
            keywords,
            suggested_topics,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextMetadata {
    /// True when any fallback replaced the full pipeline.
    pub degraded: bool,
    pub elapsed_ms: u64,
    /// Estimated preamble size, ~4 characters per token.
    pub preamble_tokens: usize,
}

/// The context plus its rendered instruction preamble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssembledContext {
    pub context: ResponseContext,
    pub preamble: String,
    pub metadata: ContextMetadata,
}

// ── Assembler ─────────────────────────────────────────────────────────────

pub struct ContextAssembler {
    store: Arc<dyn KnowledgeStore>,
    ranker: SimilarityRanker,
    retrieval: RetrievalConfig,
    platform_name: String,
    events: Option<Arc<EventBus>>,
}

impl ContextAssembler {
    pub fn new(
        store: Arc<dyn KnowledgeStore>,
        ranker: SimilarityRanker,
        retrieval: RetrievalConfig,
        assistant: &AssistantConfig,
    ) -> Self {
        Self {
            store,
            ranker,
            retrieval,
            platform_name: assistant.platform_name.clone(),
            events: None,
        }
    }

    pub fn with_events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Assemble the context for `message`.
    pub async fn assemble(&self, message: &str, user_id: Option<&str>) -> Result<AssembledContext, StoreError> {
        let started = Instant::now();
        let keywords = extract_keywords(message);
        debug!(intent = %keywords.intent, concepts = ?keywords.concepts, "Keywords extracted");

        let deadline = self.retrieval.context_deadline();
        let (context, degraded) =
            match tokio::time::timeout(deadline, self.full(message, &keywords, user_id)).await {
                Ok(Ok(context)) => (context, false),
                Ok(Err(e)) if e.is_fatal() => return Err(e),
                Ok(Err(e)) => {
                    self.note_degraded("context", &e.to_string());
                    (self.degraded(keywords).await?, true)
                }
                Err(_) => {
                    self.note_degraded("context", &format!("deadline of {}ms exceeded", deadline.as_millis()));
                    (self.degraded(keywords).await?, true)
                }
            };
        record_usage(self.store.as_ref(), context.exemplars.iter().map(|s| &s.exemplar)).await;

        let preamble = render_preamble(&self.platform_name, &context);
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let metadata = ContextMetadata {
            degraded,
            elapsed_ms,
            preamble_tokens: estimate_tokens(&preamble),
        };

        info!(
            intent = %context.keywords.intent,
            exemplars = context.exemplars.len(),
            exercises = context.exercises.len(),
            degraded,
            elapsed_ms,
            "Context assembled"
        );
        if let Some(events) = &self.events {
            events.publish(DomainEvent::ContextAssembled {
                intent: context.keywords.intent.to_string(),
                exemplars: context.exemplars.len(),
                exercises: context.exercises.len(),
                degraded,
                elapsed_ms,
                timestamp: chrono::Utc::now(),
            });
        }

        Ok(AssembledContext {
            context,
            preamble,
            metadata,
        })
    }

    async fn full(
        &self,
        message: &str,
        keywords: &ExtractedKeywords,
        user_id: Option<&str>,
    ) -> Result<ResponseContext, StoreError> {
        let corpus = self.store.active_exemplars().await?;
        let (exemplars, path) = self
            .ranker
            .rank(message, keywords, &corpus, self.retrieval.exemplar_limit)
            .await;
        debug!(?path, hits = exemplars.len(), corpus = corpus.len(), "Ranked exemplars");

        let exercises = if keywords.wants_exercises() {
            let pool = self.store.active_exercises().await?;
            match_exercises(keywords, &pool, self.retrieval.exercise_limit)
        } else {
            Vec::new()
        };

        let error_based_recommendations = if !keywords.error_types.is_empty() && user_id.is_some() {
            let messages: Vec<String> = keywords
                .raw_tokens
                .iter()
                .filter(|t| t.chars().count() >= MIN_MESSAGE_TOKEN_CHARS)
                .cloned()
                .collect();
            let found = remediation(
                &corpus,
                &messages,
                &keywords.error_types,
                self.retrieval.remediation_limit,
            );
            (!found.is_empty()).then_some(found)
        } else {
            None
        };

        Ok(ResponseContext {
            exemplars,
            exercises,
            error_based_recommendations,
            suggested_topics: keywords.suggested_topics(SUGGESTED_TOPICS),
            keywords: keywords.clone(),
        })
    }

    /// Keyword-only context under the fallback deadline.
    async fn degraded(&self, keywords: ExtractedKeywords) -> Result<ResponseContext, StoreError> {
        let deadline = self.retrieval.fallback_deadline();
        match tokio::time::timeout(deadline, self.fallback_exemplars(&keywords)).await {
            Ok(Ok(exemplars)) => Ok(ResponseContext {
                exemplars,
                ..ResponseContext::keywords_only(keywords)
            }),
            Ok(Err(e)) if e.is_fatal() => Err(e),
            Ok(Err(e)) => {
                self.note_degraded("fallback", &e.to_string());
                Ok(ResponseContext::keywords_only(keywords))
            }
            Err(_) => {
                self.note_degraded("fallback", &format!("deadline of {}ms exceeded", deadline.as_millis()));
                Ok(ResponseContext::keywords_only(keywords))
            }
        }
    }

    async fn fallback_exemplars(&self, keywords: &ExtractedKeywords) -> Result<Vec<ScoredExemplar>, StoreError> {
        let corpus = self.store.active_exemplars().await?;
        Ok(keyword_fallback(
            keywords,
            &corpus,
            self.retrieval.fallback_limit,
            self.retrieval.fallback_score,
        ))
    }

    fn note_degraded(&self, stage: &str, reason: &str) {
        warn!(stage, reason, "Retrieval degraded");
        if let Some(events) = &self.events {
            events.publish(DomainEvent::retrieval_degraded(stage, reason));
        }
    }

    pub fn context_deadline(&self) -> Duration {
        self.retrieval.context_deadline()
    }
}

// ── Preamble ──────────────────────────────────────────────────────────────

/// Render the instruction preamble for the text generator.
///
/// Deterministic: identical contexts give identical preambles. No ranking
/// happens here.
pub fn render_preamble(platform_name: &str, context: &ResponseContext) -> String {
    let mut out = String::new();
    let kw = &context.keywords;

    let _ = writeln!(
        out,
        "You are the programming tutor assistant of **{platform_name}**, a platform for learning to code by fixing bugs.\n"
    );
    out.push_str("**Your role:**\n");
    out.push_str("- Help users learn programming, debug code and understand concepts\n");
    out.push_str("- Suggest suitable exercises\n");
    out.push_str("- Help users fix errors and improve their skills\n");
    out.push_str("- Answer in a friendly, accurate and useful way\n\n");

    if !kw.concepts.is_empty() || !kw.topics.is_empty() {
        out.push_str("**Keywords detected in the question:**\n");
        if !kw.concepts.is_empty() {
            let _ = writeln!(out, "- Concepts: {}", kw.concepts.join(", "));
        }
        if !kw.languages.is_empty() {
            let _ = writeln!(out, "- Languages: {}", kw.languages.join(", "));
        }
        if !kw.error_types.is_empty() {
            let _ = writeln!(out, "- Error types: {}", kw.error_types.join(", "));
        }
        if !kw.topics.is_empty() {
            let _ = writeln!(out, "- Topics: {}", kw.topics.join(", "));
        }
        let _ = writeln!(out, "- Intent: {}\n", kw.intent);
    }

    if !context.exemplars.is_empty() {
        let _ = writeln!(out, "**Reference answers from {platform_name}:**");
        for (i, scored) in context.exemplars.iter().enumerate() {
            let e = &scored.exemplar;
            let _ = writeln!(out, "\n[Example {}]\nQ: {}\nA: {}", i + 1, e.question, e.answer);
        }
        out.push_str("\nUse these examples as reference. For similar questions, answer in a similar style.\n\n");
    }

    if !context.exercises.is_empty() {
        let _ = writeln!(out, "**Exercises on {platform_name}:**");
        for (i, x) in context.exercises.iter().enumerate() {
            let _ = writeln!(out, "\n[Exercise {}] {}", i + 1, x.title);
            let _ = writeln!(out, "   - Language: {}", x.language);
            let _ = writeln!(out, "   - Difficulty: {}", x.difficulty);
            let _ = writeln!(out, "   - Points: {}", x.points);
            if !x.description.is_empty() {
                let cut = truncate_chars(&x.description, DESCRIPTION_CHARS);
                let ellipsis = if cut.len() < x.description.len() { "..." } else { "" };
                let _ = writeln!(out, "   - Description: {cut}{ellipsis}");
            }
        }
        out.push_str("\nWhen the user asks for exercises, introduce the ones above in an engaging way.\n\n");
    }

    if let Some(recs) = context.error_based_recommendations.as_ref().filter(|r| !r.is_empty()) {
        out.push_str("**Suggestions based on the reported error:**\n");
        for (i, e) in recs.iter().enumerate() {
            let _ = writeln!(out, "\n[Suggestion {}]\nQ: {}\nA: {}", i + 1, e.question, e.answer);
        }
        out.push_str("\nRefer to these suggestions when explaining the error.\n\n");
    }

    out.push_str("**Answering guidelines:**\n");
    out.push_str("1. Be friendly and easy to understand\n");
    let _ = writeln!(out, "2. Ground the answer in the {platform_name} context above");
    out.push_str("3. Introduce exercises naturally, like a friend giving advice\n");
    let _ = writeln!(out, "4. Encourage the user to try the exercises on {platform_name}");
    out.push_str("5. Give concrete code examples when useful\n");
    out.push_str("6. Explain clearly, step by step\n");
    out
}
