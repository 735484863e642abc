//! In-process learning-resource matcher over a fixed catalog.

use async_trait::async_trait;
use tutorgraph_core::error::StoreError;
use tutorgraph_core::resource::{LearningResource, ResourceMatcher, ResourceQuery};

/// Scores a loaded catalog against a user's error profile.
///
/// `score = quality + 4·error_matches + 3·language_match + 1.5·tag_matches
/// + max(0, 3 - |level_delta|)`. When error types are given only resources
/// sharing one are candidates.
#[derive(Debug, Clone, Default)]
pub struct CatalogResourceMatcher {
    resources: Vec<LearningResource>,
}

impl CatalogResourceMatcher {
    pub fn new(resources: Vec<LearningResource>) -> Self {
        Self { resources }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn rank(&self, query: &ResourceQuery) -> Vec<LearningResource> {
        let errors = lowercase(&query.error_types);
        let languages = lowercase(&query.languages);
        let tags = lowercase(&query.tags);
        let target = query.level.rank();

        let mut scored: Vec<(&LearningResource, f64)> = self
            .resources
            .iter()
            .filter(|r| r.is_active)
            .filter_map(|r| {
                let error_matches = r
                    .error_types
                    .iter()
                    .filter(|e| errors.contains(&e.to_lowercase()))
                    .count();
                if !errors.is_empty() && error_matches == 0 {
                    return None;
                }

                let language_match = r
                    .language
                    .as_deref()
                    .is_some_and(|l| languages.contains(&l.to_lowercase()));
                let tag_matches = r.tags.iter().filter(|t| tags.contains(&t.to_lowercase())).count();
                let level_delta = (r.level.rank() - target).abs();

                let score = r.quality_score
                    + 4.0 * error_matches as f64
                    + if language_match { 3.0 } else { 0.0 }
                    + 1.5 * tag_matches as f64
                    + (3 - level_delta).max(0) as f64;
                Some((r, score))
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.into_iter().take(query.limit).map(|(r, _)| r.clone()).collect()
    }

    /// Top-quality resources restricted by language and tag, if given.
    fn fallback(&self, query: &ResourceQuery) -> Vec<LearningResource> {
        let languages = lowercase(&query.languages);
        let tags = lowercase(&query.tags);

        let mut pool: Vec<&LearningResource> = self
            .resources
            .iter()
            .filter(|r| r.is_active)
            .filter(|r| {
                languages.is_empty()
                    || r.language.as_deref().is_some_and(|l| languages.contains(&l.to_lowercase()))
            })
            .filter(|r| tags.is_empty() || r.tags.iter().any(|t| tags.contains(&t.to_lowercase())))
            .collect();

        pool.sort_by(|a, b| b.quality_score.total_cmp(&a.quality_score));
        pool.into_iter().take(query.limit).cloned().collect()
    }
}

fn lowercase(items: &[String]) -> Vec<String> {
    items.iter().map(|s| s.to_lowercase()).collect()
}

#[async_trait]
impl ResourceMatcher for CatalogResourceMatcher {
    async fn suggest(&self, query: &ResourceQuery) -> Result<Vec<LearningResource>, StoreError> {
        let ranked = self.rank(query);
        if ranked.is_empty() && query.error_types.is_empty() {
            return Ok(self.fallback(query));
        }
        Ok(ranked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutorgraph_core::history::ExperienceLevel;
    use tutorgraph_core::resource::ResourceKind;

    fn resource(id: &str, language: Option<&str>, errors: &[&str], level: ExperienceLevel, quality: f64) -> LearningResource {
        LearningResource {
            id: id.into(),
            title: format!("Resource {id}"),
            url: format!("https://example.org/{id}"),
            kind: ResourceKind::Article,
            language: language.map(str::to_string),
            level,
            error_types: errors.iter().map(|e| e.to_string()).collect(),
            tags: vec![],
            quality_score: quality,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn error_types_gate_candidates() {
        let m = CatalogResourceMatcher::new(vec![
            resource("syntax-py", Some("python"), &["syntax"], ExperienceLevel::Beginner, 1.0),
            resource("runtime", None, &["runtime"], ExperienceLevel::Beginner, 5.0),
        ]);
        let got = m
            .suggest(&ResourceQuery {
                error_types: vec!["Syntax".into()],
                languages: vec!["Python".into()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].id, "syntax-py");
    }

    #[tokio::test]
    async fn closer_level_scores_higher() {
        let m = CatalogResourceMatcher::new(vec![
            resource("advanced", None, &["logic"], ExperienceLevel::Advanced, 1.0),
            resource("beginner", None, &["logic"], ExperienceLevel::Beginner, 1.0),
        ]);
        let got = m
            .suggest(&ResourceQuery {
                error_types: vec!["logic".into()],
                level: ExperienceLevel::Beginner,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(got[0].id, "beginner");
    }

    #[tokio::test]
    async fn limit_is_respected() {
        let m = CatalogResourceMatcher::new(
            (0..10)
                .map(|i| resource(&format!("r{i}"), None, &[], ExperienceLevel::Beginner, i as f64))
                .collect(),
        );
        let got = m
            .suggest(&ResourceQuery {
                limit: 3,
                ..Default::default()
            })
            .await
            .unwrap();
        let ids: Vec<_> = got.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["r9", "r8", "r7"]);
    }

    #[tokio::test]
    async fn unmatched_error_types_yield_nothing() {
        let m = CatalogResourceMatcher::new(vec![resource(
            "py",
            Some("python"),
            &["syntax"],
            ExperienceLevel::Beginner,
            1.0,
        )]);
        let got = m
            .suggest(&ResourceQuery {
                error_types: vec!["memory".into()],
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(got.is_empty());
    }
}
