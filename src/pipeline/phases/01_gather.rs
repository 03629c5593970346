use crate::candidate::load_candidates;
use crate::pipeline::checkpoint::{find_latest_export, load_enriched};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::progress::Stage;
use crate::sources::{FetchWindow, RegistryIndex};
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{info, warn};

/// Collects raw candidates from the enriched cache, an input file, a
/// previous extraction export or a fresh extraction, and locates the
/// registry dump used for membership flags.
pub struct GatherPhase;

impl GatherPhase {
    fn resume_from_cache(&self, context: &mut PipelineContext) -> bool {
        let path = context.paths.enriched_cache.clone();
        if !path.exists() {
            warn!("Enriched cache {} not found; refetching", path.display());
            context
                .status
                .set_status(Stage::Gather, "GATHER – cache resume skipped (missing file)", false);
            context.resume_from_enriched = false;
            return false;
        }

        match load_enriched(&path) {
            Ok(candidates) => {
                info!("RESUME loaded {} enriched candidates from {}", candidates.len(), path.display());
                context.status.set_status(
                    Stage::Gather,
                    format!("GATHER – resumed {} candidates from cache", candidates.len()),
                    false,
                );
                context.candidates = candidates;
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to load enriched cache; refetching");
                context
                    .status
                    .set_status(Stage::Gather, "GATHER – cache resume failed, refetching", false);
                context.resume_from_enriched = false;
                false
            }
        }
    }

    fn reuse_export(&self, context: &mut PipelineContext) {
        let bases = context.paths.export_search_bases();
        let Some(export) = find_latest_export(&bases, &context.paths.label) else {
            info!(
                "No Pub2Tools export found for {}; fetching instead",
                context.paths.label
            );
            return;
        };

        let candidates = load_candidates(&export);
        if candidates.is_empty() {
            warn!("Pub2Tools export {} has no candidates; fetching instead", export.display());
            return;
        }
        info!("RESUME reused {} candidates from {}", candidates.len(), export.display());
        context.status.set_status(
            Stage::Gather,
            format!("GATHER – reused {} candidates from Pub2Tools cache", candidates.len()),
            false,
        );
        context.candidates = candidates;
        context.resume_export = Some(export);
    }

    async fn fetch(&self, context: &mut PipelineContext) {
        let Some(fetcher) = context.services.fetcher.clone() else {
            warn!("No candidate fetcher configured");
            return;
        };
        context
            .status
            .set_status(Stage::Gather, "GATHER – invoking Pub2Tools fetch", false);

        let window = FetchWindow {
            from: context.paths.from,
            to: context.paths.to,
            limit: context.config.limit,
        };
        let output_dir = context.paths.pub2tools_dir.clone();
        match fetcher.fetch(&window, &output_dir).await {
            Ok(candidates) => {
                info!("FETCH complete – {} candidates retrieved from {}", candidates.len(), fetcher.name());
                context.status.set_status(
                    Stage::Gather,
                    format!("GATHER – fetched {} candidates via Pub2Tools", candidates.len()),
                    false,
                );
                context.candidates = candidates;
            }
            Err(e) => {
                warn!(error = %e, "Pub2Tools fetch failed");
                context
                    .status
                    .set_status(Stage::Gather, "GATHER – Pub2Tools fetch failed", false);
            }
        }
    }

    fn registry_roots(&self, context: &PipelineContext) -> Vec<PathBuf> {
        let mut roots: Vec<PathBuf> = Vec::new();
        if let Some(path) = &context.config.registry_path {
            roots.push(path.clone());
        }
        roots.push(context.paths.pub2tools_dir.clone());
        let parents = [context.resume_export.as_ref(), context.config.input.as_ref()];
        for parent in parents.into_iter().flatten().filter_map(|p| p.parent()) {
            if !parent.as_os_str().is_empty() {
                roots.push(parent.to_path_buf());
            }
        }
        roots.dedup();
        roots
    }
}

#[async_trait]
impl WorkflowPhase for GatherPhase {
    async fn execute(&self, context: &mut PipelineContext) -> Result<()> {
        context
            .status
            .set_status(Stage::Gather, "GATHER – preparing input sources", false);

        let mut gathered = false;
        if context.resume_from_enriched {
            gathered = self.resume_from_cache(context);
        }

        if !gathered {
            if let Some(input) = context.config.input.clone() {
                let candidates = load_candidates(&input);
                info!("INPUT loaded {} candidates from {}", candidates.len(), input.display());
                context.status.set_status(
                    Stage::Gather,
                    format!("GATHER – loaded {} candidates from input", candidates.len()),
                    false,
                );
                context.candidates = candidates;
            } else {
                if context.config.resume_from_pub2tools {
                    self.reuse_export(context);
                }
                if context.candidates.is_empty() {
                    context.status.set_status(
                        Stage::Gather,
                        "GATHER – no local input, Pub2Tools may run",
                        false,
                    );
                    if context.config.offline {
                        warn!("Offline mode: skipping Pub2Tools fetch");
                    } else {
                        self.fetch(context).await;
                    }
                }
            }
        }

        context.registry = RegistryIndex::discover(&self.registry_roots(context));
        if context.registry.is_none() {
            info!("No bio.tools registry dump found; membership flags stay unknown");
        }
        Ok(())
    }
}
