use crate::pipeline::checkpoint::save_enriched;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::progress::Stage;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

/// Adds homepage reachability and Europe PMC abstracts to the candidates.
///
/// Both steps are skipped when the candidates came from a cache, because
/// the cached records already carry the enrichment.
pub struct EnrichPhase;

#[derive(Debug, Clone, Copy)]
enum Skip {
    Offline,
    Cache,
    Disabled,
}

impl Skip {
    fn scrape_label(self) -> &'static str {
        match self {
            Skip::Offline => "offline mode",
            Skip::Cache => "cache reuse",
            Skip::Disabled => "disabled",
        }
    }

    fn europe_pmc_label(self) -> &'static str {
        match self {
            Skip::Offline => "offline",
            Skip::Cache => "cache",
            Skip::Disabled => "disabled",
        }
    }
}

impl EnrichPhase {
    fn skip_reason(&self, context: &PipelineContext, enabled: bool) -> Option<Skip> {
        if context.config.offline {
            Some(Skip::Offline)
        } else if context.resume_from_enriched {
            Some(Skip::Cache)
        } else if !enabled {
            Some(Skip::Disabled)
        } else {
            None
        }
    }

    async fn scrape_homepages(&self, context: &mut PipelineContext) {
        let enabled = context.config.scrape_homepages && context.services.scraper.is_some();
        if let Some(skip) = self.skip_reason(context, enabled) {
            let reason = skip.scrape_label();
            info!("SCRAPE skipped ({})", reason);
            context.status.set_status(
                Stage::Enrich,
                format!("SCRAPE – skipped ({})", reason),
                true,
            );
            return;
        }
        let Some(scraper) = context.services.scraper.clone() else {
            return;
        };

        let total = context.candidates.len();
        info!("SCRAPE homepage metadata for {} candidates", total);
        context.status.set_status(
            Stage::Enrich,
            format!("SCRAPE – scanning {} homepages", total),
            false,
        );
        context.status.update_progress(Stage::Enrich, 0, total);

        // One homepage at a time; only SCORE fans out.
        for (done, candidate) in context.candidates.iter_mut().enumerate() {
            scraper.scrape(candidate).await;
            context.status.update_progress(Stage::Enrich, done + 1, total);
        }

        let probed = context
            .candidates
            .iter()
            .filter(|c| c.extra.get("homepage_scraped") == Some(&Value::Bool(true)))
            .count();
        info!("SCRAPE completed for {}/{} homepages", probed, total);
        context.status.set_status(
            Stage::Enrich,
            format!("SCRAPE – completed {}/{} homepages", probed, total),
            true,
        );
    }

    async fn enrich_publications(&self, context: &mut PipelineContext) {
        let enabled = context.config.enrich_publications && context.services.enricher.is_some();
        if let Some(skip) = self.skip_reason(context, enabled) {
            let reason = skip.europe_pmc_label();
            info!("Europe PMC enrichment skipped ({})", reason);
            context.status.set_status(
                Stage::Enrich,
                format!("ENRICH – Europe PMC skipped ({})", reason),
                false,
            );
            return;
        }
        let Some(enricher) = context.services.enricher.clone() else {
            return;
        };

        let total = context.candidates.len();
        context.status.set_status(
            Stage::Enrich,
            format!("ENRICH – Europe PMC processing {} candidates", total),
            false,
        );
        let status = context.status.clone();
        let progress = move |current: usize, total: usize| {
            status.update_progress(Stage::Enrich, current, total);
        };

        match enricher.enrich(&mut context.candidates, &progress).await {
            Ok(count) => {
                info!("ENRICH Europe PMC added abstracts for {}/{} candidates", count, total);
                context
                    .status
                    .set_status(Stage::Enrich, "ENRICH – Europe PMC metadata added", true);
            }
            Err(e) => {
                warn!(error = %e, "Europe PMC enrichment failed");
                context
                    .status
                    .set_status(Stage::Enrich, "ENRICH – Europe PMC error, see logs", true);
            }
        }
    }
}

#[async_trait]
impl WorkflowPhase for EnrichPhase {
    async fn execute(&self, context: &mut PipelineContext) -> Result<()> {
        if context.candidates.is_empty() {
            info!("ENRICH – skipped (no candidates)");
            context
                .status
                .set_status(Stage::Enrich, "ENRICH – skipped (no candidates)", false);
            return Ok(());
        }

        self.scrape_homepages(context).await;
        self.enrich_publications(context).await;

        if !context.resume_from_enriched {
            save_enriched(&context.candidates, &context.paths.enriched_cache);
        }
        Ok(())
    }
}
