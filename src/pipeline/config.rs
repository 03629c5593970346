use crate::scoring::Thresholds;
use std::path::PathBuf;

/// Per-run settings after config file, environment and CLI merging.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Start of the extraction window (`7d`, `2025-01-01`, ...).
    pub from_date: String,
    pub to_date: Option<String>,
    pub bio_thresholds: Thresholds,
    pub doc_thresholds: Thresholds,
    pub limit: Option<usize>,
    pub concurrency: usize,
    pub offline: bool,
    pub dry_run: bool,
    pub resume_from_enriched: bool,
    pub resume_from_pub2tools: bool,
    pub resume_from_scoring: bool,
    /// Explicit candidate file; disables the extraction tool.
    pub input: Option<PathBuf>,
    pub registry_path: Option<PathBuf>,
    pub output_root: PathBuf,
    pub payload_path: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub enriched_cache: Option<PathBuf>,
    pub llm_log: Option<PathBuf>,
    pub llm_trace: Option<PathBuf>,
    pub scrape_homepages: bool,
    pub enrich_publications: bool,
    pub validate_biotools_api: bool,
    pub model: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            from_date: "7d".to_string(),
            to_date: None,
            bio_thresholds: Thresholds::bio_default(),
            doc_thresholds: Thresholds::doc_default(),
            limit: None,
            concurrency: 8,
            offline: false,
            dry_run: false,
            resume_from_enriched: false,
            resume_from_pub2tools: false,
            resume_from_scoring: false,
            input: None,
            registry_path: None,
            output_root: PathBuf::from("out"),
            payload_path: None,
            report_path: None,
            enriched_cache: None,
            llm_log: None,
            llm_trace: None,
            scrape_homepages: true,
            enrich_publications: true,
            validate_biotools_api: false,
            model: crate::llm::DEFAULT_MODEL.to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dates(mut self, from_date: impl Into<String>, to_date: Option<String>) -> Self {
        self.from_date = from_date.into();
        self.to_date = to_date;
        self
    }

    pub fn with_thresholds(mut self, bio: Thresholds, doc: Thresholds) -> Self {
        self.bio_thresholds = Thresholds::new(bio.review, bio.add);
        self.doc_thresholds = Thresholds::new(doc.review, doc.add);
        self
    }

    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_offline(mut self, offline: bool) -> Self {
        self.offline = offline;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_resume(mut self, enriched: bool, pub2tools: bool, scoring: bool) -> Self {
        self.resume_from_enriched = enriched;
        self.resume_from_pub2tools = pub2tools;
        self.resume_from_scoring = scoring;
        self
    }

    pub fn with_input(mut self, input: Option<PathBuf>) -> Self {
        self.input = input;
        self
    }

    pub fn with_registry_path(mut self, registry_path: Option<PathBuf>) -> Self {
        self.registry_path = registry_path;
        self
    }

    pub fn with_output_root(mut self, output_root: impl Into<PathBuf>) -> Self {
        self.output_root = output_root.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_enrichment(mut self, scrape_homepages: bool, enrich_publications: bool) -> Self {
        self.scrape_homepages = scrape_homepages;
        self.enrich_publications = enrich_publications;
        self
    }

    pub fn with_validate_biotools_api(mut self, validate: bool) -> Self {
        self.validate_biotools_api = validate;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.from_date, "7d");
        assert_eq!(config.concurrency, 8);
        assert_eq!(config.output_root, PathBuf::from("out"));
        assert_eq!(config.bio_thresholds, Thresholds::new(0.5, 0.6));
        assert!(config.scrape_homepages);
        assert!(!config.offline);
    }

    #[test]
    fn test_builder_pattern() {
        let config = PipelineConfig::new()
            .with_dates("2025-01-01", Some("2025-01-31".to_string()))
            .with_thresholds(Thresholds::new(0.9, 0.4), Thresholds::new(0.2, 0.7))
            .with_limit(Some(5))
            .with_concurrency(0)
            .with_offline(true)
            .with_resume(false, true, true)
            .with_input(Some(PathBuf::from("candidates.json")));

        assert_eq!(config.from_date, "2025-01-01");
        assert_eq!(config.limit, Some(5));
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.bio_thresholds, Thresholds::new(0.4, 0.4));
        assert_eq!(config.doc_thresholds.review, 0.2);
        assert!(config.offline);
        assert!(config.resume_from_scoring && config.resume_from_pub2tools);
        assert_eq!(config.input, Some(PathBuf::from("candidates.json")));
    }
}
