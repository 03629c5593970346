use crate::candidate::{is_probable_publication_url, primary_homepage, Candidate};
use crate::pipeline::checkpoint::save_enriched;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::progress::Stage;
use crate::sources::RegistryIndex;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashSet;
use tracing::info;

/// Normalizes homepages, collapses duplicates, marks registry membership,
/// checkpoints the candidate list and applies the run limit.
pub struct DedupPhase;

/// Keeps the first candidate for each `(title, primary url)` key.
pub fn dedup_candidates(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let mut seen: HashSet<(String, String)> = HashSet::new();
    candidates
        .into_iter()
        .map(|mut candidate| {
            candidate.normalize_homepage();
            candidate
        })
        .filter(|candidate| seen.insert(candidate.dedup_key()))
        .collect()
}

/// Sets `in_biotools_name` and `in_biotools`; both stay unknown without a
/// registry. Publication links are dropped from the homepage first.
pub fn mark_registry_membership(candidates: &mut [Candidate], registry: Option<&RegistryIndex>) {
    let Some(registry) = registry else {
        for candidate in candidates.iter_mut() {
            candidate.in_biotools_name = None;
            candidate.in_biotools = None;
        }
        return;
    };

    let mut name_hits = 0;
    let mut exact_hits = 0;
    for candidate in candidates.iter_mut() {
        if candidate
            .homepage
            .as_deref()
            .is_some_and(is_probable_publication_url)
        {
            candidate.homepage = None;
        }
        if candidate.homepage.as_deref().map_or(true, str::is_empty) {
            if let Some(homepage) = primary_homepage(&candidate.urls) {
                candidate.homepage = Some(homepage);
            }
        }

        let name = candidate.display_title().map(str::to_string);
        let name_match = registry.contains_name(name.as_deref());
        let exact_match = registry.contains(name.as_deref(), candidate.homepage.as_deref());
        candidate.in_biotools_name = Some(name_match);
        candidate.in_biotools = Some(exact_match);
        name_hits += usize::from(name_match);
        exact_hits += usize::from(exact_match);
    }

    if !candidates.is_empty() {
        info!(
            "REGISTRY name matches: {}/{}; exact homepage matches: {}",
            name_hits,
            candidates.len(),
            exact_hits
        );
    }
}

#[async_trait]
impl WorkflowPhase for DedupPhase {
    async fn execute(&self, context: &mut PipelineContext) -> Result<()> {
        if context.candidates.is_empty() {
            context
                .status
                .set_status(Stage::Dedup, "DEDUP – no candidates available", false);
        } else {
            context.status.set_status(
                Stage::Dedup,
                format!("DEDUP – processing {} candidates", context.candidates.len()),
                false,
            );
            let candidates = std::mem::take(&mut context.candidates);
            context.candidates = dedup_candidates(candidates);
            info!(
                "DEDUP kept {} unique candidates after normalization",
                context.candidates.len()
            );
            context.status.set_status(
                Stage::Dedup,
                format!("DEDUP – kept {} unique candidates", context.candidates.len()),
                false,
            );
        }

        mark_registry_membership(&mut context.candidates, context.registry.as_ref());

        if !context.candidates.is_empty() && !context.resume_from_enriched {
            save_enriched(&context.candidates, &context.paths.enriched_cache);
        }

        if let Some(limit) = context.config.limit {
            context.candidates.truncate(limit);
            info!("LIMIT applied – processing {} candidates", context.candidates.len());
            context.status.set_status(
                Stage::Dedup,
                format!("DEDUP – limit applied, {} remain", context.candidates.len()),
                false,
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(value: serde_json::Value) -> Candidate {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_dedup_candidates() {
        let kept = dedup_candidates(vec![
            candidate(json!({"title": "ToolX", "urls": ["https://toolx.org/"]})),
            candidate(json!({"title": "toolx", "urls": ["https://toolx.org"]})),
            candidate(json!({"title": "ToolX", "urls": ["https://other.org"]})),
        ]);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].homepage.as_deref(), Some("https://toolx.org/"));
    }

    #[test]
    fn test_registry_flags_unknown_without_registry() {
        let mut candidates = vec![candidate(json!({"title": "ToolX", "in_biotools": true}))];
        mark_registry_membership(&mut candidates, None);
        assert_eq!(candidates[0].in_biotools, None);
        assert_eq!(candidates[0].in_biotools_name, None);
    }

    #[test]
    fn test_registry_flags() {
        let mut registry = RegistryIndex::default();
        registry.insert("ToolX", Some("https://toolx.org"));

        let mut candidates = vec![
            candidate(json!({
                "title": "ToolX",
                "homepage": "https://doi.org/10.1/x",
                "urls": ["https://doi.org/10.1/x", "https://toolx.org"]
            })),
            candidate(json!({"title": "ToolX", "homepage": "https://mirror.org"})),
            candidate(json!({"title": "ToolZ"})),
        ];
        mark_registry_membership(&mut candidates, Some(&registry));

        assert_eq!(candidates[0].homepage.as_deref(), Some("https://toolx.org"));
        assert_eq!(candidates[0].in_biotools, Some(true));
        assert_eq!(candidates[1].in_biotools_name, Some(true));
        assert_eq!(candidates[1].in_biotools, Some(false));
        assert_eq!(candidates[2].in_biotools_name, Some(false));
    }
}
