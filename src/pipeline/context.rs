//! Pipeline context for managing dependencies and run state

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::biotools::BioToolsApi;
use crate::candidate::Candidate;
use crate::output::DecisionRow;
use crate::progress::PipelineStatus;
use crate::scoring::{DecisionCategory, Scorer};
use crate::sources::{CandidateFetcher, HomepageScraper, PublicationEnricher, RegistryIndex};
use crate::validation::Validator;

use super::config::PipelineConfig;
use super::paths::RunPaths;

/// Long-lived collaborators. Absent ones disable the stage that needs them.
#[derive(Clone)]
pub struct PipelineServices {
    /// LLM scorer; `None` means heuristic scoring only
    pub scorer: Option<Arc<Scorer>>,

    /// Candidate extraction tool
    pub fetcher: Option<Arc<dyn CandidateFetcher>>,

    pub scraper: Option<Arc<dyn HomepageScraper>>,

    pub enricher: Option<Arc<dyn PublicationEnricher>>,

    /// Local payload validator
    pub validator: Arc<Validator>,

    /// bio.tools API for remote validation and existence checks
    pub biotools: Option<Arc<BioToolsApi>>,
}

impl Default for PipelineServices {
    fn default() -> Self {
        Self {
            scorer: None,
            fetcher: None,
            scraper: None,
            enricher: None,
            validator: Arc::new(Validator::new()),
            biotools: None,
        }
    }
}

impl PipelineServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_scorer(mut self, scorer: Arc<Scorer>) -> Self {
        self.scorer = Some(scorer);
        self
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn CandidateFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_scraper(mut self, scraper: Arc<dyn HomepageScraper>) -> Self {
        self.scraper = Some(scraper);
        self
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn PublicationEnricher>) -> Self {
        self.enricher = Some(enricher);
        self
    }

    pub fn with_validator(mut self, validator: Arc<Validator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_biotools(mut self, api: Arc<BioToolsApi>) -> Self {
        self.biotools = Some(api);
        self
    }
}

/// How often scoring fell back to heuristics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScoreFallbacks {
    /// Per-candidate LLM failures
    pub llm: usize,
    /// Whole run degraded because the health probe failed
    pub health: usize,
}

/// Everything a phase reads or produces during one run.
pub struct PipelineContext {
    pub config: PipelineConfig,
    pub paths: RunPaths,
    pub status: Arc<PipelineStatus>,
    pub services: PipelineServices,

    pub candidates: Vec<Candidate>,
    pub registry: Option<RegistryIndex>,
    /// Report rows reused from an earlier run
    pub cached_rows: Option<Vec<DecisionRow>>,
    pub resume_from_enriched: bool,
    /// Extraction export reused instead of fetching
    pub resume_export: Option<PathBuf>,
    pub scoring_resumed: bool,

    pub rows: Vec<DecisionRow>,
    pub add_entries: Vec<Map<String, Value>>,
    pub review_entries: Vec<Map<String, Value>>,
    pub fallbacks: ScoreFallbacks,
    pub score_duration: Duration,
}

impl PipelineContext {
    pub fn new(
        config: PipelineConfig,
        paths: RunPaths,
        status: Arc<PipelineStatus>,
        services: PipelineServices,
    ) -> Self {
        let resume_from_enriched = config.resume_from_enriched;
        Self {
            config,
            paths,
            status,
            services,
            candidates: Vec::new(),
            registry: None,
            cached_rows: None,
            resume_from_enriched,
            resume_export: None,
            scoring_resumed: false,
            rows: Vec::new(),
            add_entries: Vec::new(),
            review_entries: Vec::new(),
            fallbacks: ScoreFallbacks::default(),
            score_duration: Duration::ZERO,
        }
    }

    pub fn has_explicit_input(&self) -> bool {
        self.config.input.is_some()
    }

    /// `(add, review, do_not_add)` over the scored rows.
    pub fn decision_counts(&self) -> (usize, usize, usize) {
        let count = |category| {
            self.rows
                .iter()
                .filter(|row| row.category() == Some(category))
                .count()
        };
        let add = count(DecisionCategory::Add);
        let review = count(DecisionCategory::Review);
        (add, review, self.rows.len().saturating_sub(add + review))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn context() -> PipelineContext {
        let config = PipelineConfig::new().with_resume(true, false, false);
        let paths = RunPaths::with_label(&config, "custom_tool_set".to_string(), Utc::now(), None);
        PipelineContext::new(config, paths, Arc::new(PipelineStatus::default()), PipelineServices::new())
    }

    #[test]
    fn test_context_creation() {
        let ctx = context();
        assert!(ctx.resume_from_enriched);
        assert!(!ctx.has_explicit_input());
        assert!(ctx.services.scorer.is_none());
        assert_eq!(ctx.decision_counts(), (0, 0, 0));
    }

    #[test]
    fn test_decision_counts() {
        let mut ctx = context();
        for decision in ["add", "review", "review", "do_not_add"] {
            ctx.rows
                .push(serde_json::from_value(json!({"include": decision})).unwrap());
        }
        ctx.rows.push(DecisionRow::default());
        assert_eq!(ctx.decision_counts(), (1, 2, 2));
    }
}
