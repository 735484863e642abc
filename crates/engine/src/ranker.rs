//! Similarity ranker: exemplars ordered by relevance to an utterance.
//!
//! Vector similarity is tried first when the embedding backend is trained.
//! Anything short of a non-empty vector result (no tokens, no utterance
//! vector, nothing above the similarity floor) falls through to the
//! keyword/tag overlap scorer, which never touches the backend.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use tutorgraph_config::RetrievalConfig;
use tutorgraph_core::corpus::{fallback_order, Exemplar};
use tutorgraph_core::error::StoreError;
use tutorgraph_core::keywords::ExtractedKeywords;
use tutorgraph_core::store::KnowledgeStore;
use tutorgraph_embedding::{cosine_similarity, normalize_tokens, EmbeddingGateway};

/// An exemplar with its relevance score in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredExemplar {
    #[serde(flatten)]
    pub exemplar: Exemplar,
    pub score: f64,
}

/// Which path produced a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankPath {
    Vector,
    Keyword,
}

pub struct SimilarityRanker {
    gateway: EmbeddingGateway,
    min_similarity: f64,
    fallback_score: f64,
}

impl SimilarityRanker {
    pub fn new(gateway: EmbeddingGateway, config: &RetrievalConfig) -> Self {
        Self {
            gateway,
            min_similarity: config.min_similarity,
            fallback_score: config.fallback_score,
        }
    }

    /// Rank `corpus` against `utterance`, returning at most `k` items sorted
    /// by descending score.
    pub async fn rank(
        &self,
        utterance: &str,
        keywords: &ExtractedKeywords,
        corpus: &[Exemplar],
        k: usize,
    ) -> (Vec<ScoredExemplar>, RankPath) {
        if k == 0 || corpus.is_empty() {
            return (Vec::new(), RankPath::Keyword);
        }

        if self.gateway.is_trained() {
            if let Some(ranked) = self.rank_by_vector(utterance, corpus, k).await {
                if !ranked.is_empty() {
                    return (ranked, RankPath::Vector);
                }
            }
            debug!("No vector matches, using keyword fallback");
        }

        (
            keyword_fallback(keywords, corpus, k, self.fallback_score),
            RankPath::Keyword,
        )
    }

    /// Read the active corpus, rank it and bump the usage counter of every
    /// returned exemplar once.
    ///
    /// Only the corpus read can fail; counter updates are best-effort.
    pub async fn retrieve(
        &self,
        store: &dyn KnowledgeStore,
        utterance: &str,
        keywords: &ExtractedKeywords,
        k: usize,
    ) -> Result<Vec<ScoredExemplar>, StoreError> {
        let corpus = store.active_exemplars().await?;
        let (ranked, path) = self.rank(utterance, keywords, &corpus, k).await;
        debug!(?path, hits = ranked.len(), corpus = corpus.len(), "Ranked exemplars");
        record_usage(store, ranked.iter().map(|s| &s.exemplar)).await;
        Ok(ranked)
    }

    async fn rank_by_vector(
        &self,
        utterance: &str,
        corpus: &[Exemplar],
        k: usize,
    ) -> Option<Vec<ScoredExemplar>> {
        let tokens = normalize_tokens(utterance);
        if tokens.is_empty() {
            return None;
        }
        let query = self.gateway.vector(&tokens).await?;

        let mut scored = Vec::new();
        for exemplar in corpus {
            let Some(vector) = self.gateway.vector_for_text(&exemplar.question).await else {
                continue;
            };
            let similarity = cosine_similarity(&query, &vector);
            if similarity >= self.min_similarity {
                scored.push(ScoredExemplar {
                    exemplar: exemplar.clone(),
                    score: similarity.clamp(0.0, 1.0),
                });
            }
        }

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(k);
        Some(scored)
    }
}

/// Keyword/tag overlap ranking.
///
/// A text hit scores 2 and a tag hit 3 per search term. Matches are put in
/// the shared fallback order, cut to `2k`, stably re-sorted by overlap and
/// cut to `k`. Every result carries the constant `score`.
pub fn keyword_fallback(
    keywords: &ExtractedKeywords,
    corpus: &[Exemplar],
    k: usize,
    score: f64,
) -> Vec<ScoredExemplar> {
    let terms: Vec<String> = keywords
        .search_terms()
        .iter()
        .map(|t| t.to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    if terms.is_empty() || k == 0 {
        return Vec::new();
    }

    let mut matched: Vec<(&Exemplar, u32)> = corpus
        .iter()
        .filter_map(|e| {
            let overlap = overlap_score(e, &terms);
            (overlap > 0).then_some((e, overlap))
        })
        .collect();

    matched.sort_by(|a, b| fallback_order(a.0, b.0));
    matched.truncate(k.saturating_mul(2));
    matched.sort_by(|a, b| b.1.cmp(&a.1));
    matched.truncate(k);

    matched
        .into_iter()
        .map(|(e, _)| ScoredExemplar {
            exemplar: e.clone(),
            score,
        })
        .collect()
}

fn overlap_score(exemplar: &Exemplar, terms: &[String]) -> u32 {
    let text = exemplar.text_lower();
    let tags: Vec<String> = exemplar.tags.iter().map(|t| t.to_lowercase()).collect();
    terms
        .iter()
        .map(|term| {
            let mut s = 0;
            if text.contains(term.as_str()) {
                s += 2;
            }
            if tags.iter().any(|t| t == term) {
                s += 3;
            }
            s
        })
        .sum()
}

/// Increment usage counters for `exemplars`, logging instead of failing.
pub(crate) async fn record_usage<'a>(
    store: &dyn KnowledgeStore,
    exemplars: impl Iterator<Item = &'a Exemplar>,
) {
    let ids: Vec<String> = exemplars.map(|e| e.id.clone()).collect();
    if ids.is_empty() {
        return;
    }
    if let Err(e) = store.increment_usage(&ids).await {
        warn!(error = %e, count = ids.len(), "Failed to record exemplar usage");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keywords::extract_keywords;
    use chrono::{Duration, Utc};
    use std::sync::Arc;
    use tutorgraph_embedding::ScriptedEmbedder;
    use tutorgraph_store::InMemoryStore;

    fn exemplar(id: &str, question: &str, tags: &[&str], priority: i32, age_days: i64) -> Exemplar {
        Exemplar {
            id: id.into(),
            question: question.into(),
            answer: "See the docs.".into(),
            category: "general".into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            priority,
            usage_count: 0,
            is_active: true,
            created_at: Utc::now() - Duration::days(age_days),
        }
    }

    fn ranker(embedder: ScriptedEmbedder) -> SimilarityRanker {
        let gateway = EmbeddingGateway::new(Arc::new(embedder), std::time::Duration::from_secs(1));
        SimilarityRanker::new(gateway, &RetrievalConfig::default())
    }

    #[test]
    fn fallback_orders_by_priority_then_recency() {
        let corpus = vec![
            exemplar("old", "Recursion basics", &[], 1, 10),
            exemplar("tagged", "Base cases", &["python"], 1, 1),
            exemplar("important", "Recursion depth", &[], 3, 30),
            exemplar("unrelated", "Sorting lists", &[], 5, 0),
        ];
        let kw = extract_keywords("recursion python");
        let ranked = keyword_fallback(&kw, &corpus, 5, 0.5);
        let ids: Vec<_> = ranked.iter().map(|s| s.exemplar.id.as_str()).collect();
        // Tag hits outrank text hits; equal overlap keeps priority/recency order
        assert_eq!(ids, vec!["tagged", "important", "old"]);
        assert!(ranked.iter().all(|s| s.score == 0.5));
    }

    #[test]
    fn fallback_prefers_tag_hits_after_trimming() {
        let corpus = vec![
            exemplar("text", "closure in javascript", &[], 1, 0),
            exemplar("tag", "captured variables", &["closure"], 1, 5),
        ];
        let kw = ExtractedKeywords {
            concepts: vec!["closure".into()],
            ..Default::default()
        };
        let ranked = keyword_fallback(&kw, &corpus, 2, 0.5);
        assert_eq!(ranked[0].exemplar.id, "tag");
        assert_eq!(ranked[1].exemplar.id, "text");
    }

    #[test]
    fn fallback_with_no_terms_is_empty() {
        let corpus = vec![exemplar("a", "anything", &[], 1, 0)];
        assert!(keyword_fallback(&ExtractedKeywords::default(), &corpus, 3, 0.5).is_empty());
    }

    #[tokio::test]
    async fn untrained_backend_matches_direct_fallback() {
        let scripted = ScriptedEmbedder::untrained().with("recursion", vec![1.0, 0.0]);
        let r = ranker(scripted);
        let corpus = vec![
            exemplar("a", "Recursion in Python", &["python"], 1, 3),
            exemplar("b", "Python lists", &[], 2, 1),
        ];
        let kw = extract_keywords("what is recursion in python");
        let (ranked, path) = r.rank("what is recursion in python", &kw, &corpus, 5).await;
        assert_eq!(path, RankPath::Keyword);
        assert_eq!(ranked, keyword_fallback(&kw, &corpus, 5, 0.5));
    }

    #[tokio::test]
    async fn vector_path_filters_and_sorts() {
        let scripted = ScriptedEmbedder::new()
            .with("recursion", vec![1.0, 0.0])
            .with("recursive", vec![0.9, 0.1])
            .with("loops", vec![0.0, 1.0]);
        let r = ranker(scripted);
        let corpus = vec![
            exemplar("loops", "loops", &[], 1, 0),
            exemplar("near", "recursive", &[], 1, 0),
            exemplar("exact", "recursion", &[], 1, 0),
        ];
        let kw = extract_keywords("recursion");
        let (ranked, path) = r.rank("recursion", &kw, &corpus, 5).await;
        assert_eq!(path, RankPath::Vector);
        let ids: Vec<_> = ranked.iter().map(|s| s.exemplar.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "near"]);
        assert!(ranked.iter().all(|s| (0.0..=1.0).contains(&s.score)));
        assert!(ranked[0].score >= ranked[1].score);
    }

    #[tokio::test]
    async fn no_vector_hits_fall_back_to_keywords() {
        let scripted = ScriptedEmbedder::new()
            .with("recursion", vec![1.0, 0.0])
            .with("loops", vec![0.0, 1.0]);
        let r = ranker(scripted);
        let corpus = vec![exemplar("loops", "loops", &["recursion"], 1, 0)];
        let kw = extract_keywords("recursion");
        let (ranked, path) = r.rank("recursion", &kw, &corpus, 5).await;
        assert_eq!(path, RankPath::Keyword);
        assert_eq!(ranked.len(), 1);
    }

    #[tokio::test]
    async fn retrieve_bumps_usage_once() {
        let store = InMemoryStore::new();
        store
            .put_exemplar(exemplar("a", "Recursion in Python", &[], 1, 0))
            .await;
        store.put_exemplar(exemplar("b", "Unrelated", &[], 1, 0)).await;

        let r = ranker(ScriptedEmbedder::untrained());
        let kw = extract_keywords("recursion");
        let ranked = r.retrieve(&store, "recursion", &kw, 5).await.unwrap();
        assert_eq!(ranked.len(), 1);

        let all = store.all_exemplars().await;
        let a = all.iter().find(|e| e.id == "a").unwrap();
        let b = all.iter().find(|e| e.id == "b").unwrap();
        assert_eq!(a.usage_count, 1);
        assert_eq!(b.usage_count, 0);
    }

    #[tokio::test]
    async fn unavailable_store_propagates() {
        let store = InMemoryStore::new();
        store.set_available(false);
        let r = ranker(ScriptedEmbedder::untrained());
        let err = r
            .retrieve(&store, "x", &ExtractedKeywords::default(), 5)
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
