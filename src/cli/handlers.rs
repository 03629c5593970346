//! Subcommand handlers. Each returns the process exit code.

use crate::biotools::{load_payload, read_token, upload_entries, write_upload_report_csv, BioToolsApi, UploadStatus};
use crate::cli::commands::{HealthArgs, RunArgs, UploadArgs};
use crate::config::AnnotateConfig;
use crate::llm::{OllamaClient, OllamaConfig, TextGenerator};
use crate::pipeline::{PipelineContext, PipelineOrchestrator, PipelineServices, RunPaths, RunSummary};
use crate::progress::{build_handler, PipelineStatus, ProgressMode};
use crate::scoring::Scorer;
use crate::sources::{EuropePmcClient, HttpHomepageScraper, Pub2ToolsCli};
use crate::validation::Validator;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Applies `run` flags on top of the loaded configuration.
pub fn apply_run_args(config: &mut AnnotateConfig, args: &RunArgs) {
    let p = &mut config.pipeline;
    if let Some(from) = &args.from_date {
        p.from_date = from.clone();
    }
    if args.to_date.is_some() {
        p.to_date = args.to_date.clone();
    }
    if let Some(v) = args.bio_add {
        p.bio_thresholds.add = v;
    }
    if let Some(v) = args.bio_review {
        p.bio_thresholds.review = v;
    }
    if let Some(v) = args.doc_add {
        p.doc_thresholds.add = v;
    }
    if let Some(v) = args.doc_review {
        p.doc_thresholds.review = v;
    }
    if args.limit.is_some() {
        p.limit = args.limit;
    }
    if let Some(n) = args.concurrency {
        p.concurrency = n;
    }
    if args.input.is_some() {
        p.input = args.input.clone();
    }
    if args.registry.is_some() {
        p.registry_path = args.registry.clone();
    }
    if let Some(root) = &args.output_root {
        p.output_root = root.clone();
    }
    if args.payload.is_some() {
        p.payload_path = args.payload.clone();
    }
    if args.report.is_some() {
        p.report_path = args.report.clone();
    }
    if args.enriched_cache.is_some() {
        p.enriched_cache = args.enriched_cache.clone();
    }

    p.offline |= args.offline;
    p.dry_run |= args.dry_run;
    p.resume_from_enriched |= args.resume_from_enriched;
    p.resume_from_pub2tools |= args.resume_from_pub2tools;
    p.resume_from_scoring |= args.resume_from_scoring;
    p.validate_biotools_api |= args.validate_biotools_api;

    if args.no_homepage_scrape {
        config.enrichment.homepage.enabled = false;
    }
    if args.no_europe_pmc {
        config.enrichment.europe_pmc.enabled = false;
    }
    if let Some(model) = &args.model {
        config.ollama.model = model.clone();
    }
}

/// Wires the real network collaborators for one run.
pub fn build_services(config: &AnnotateConfig, paths: &RunPaths) -> PipelineServices {
    let client: Arc<dyn TextGenerator> = Arc::new(OllamaClient::new(config.ollama.to_client_config(paths)));
    let scorer = Scorer::new(client, config.ollama.model.clone())
        .with_max_attempts(config.ollama.max_attempts)
        .with_sampling(
            Some(config.ollama.temperature),
            Some(config.ollama.top_p),
            config.ollama.seed,
        );

    let token = read_token(Some(config.biotools.token_file.as_path()));
    let biotools = BioToolsApi::new(
        config.biotools.api_base.clone(),
        config.biotools.validate_url.clone(),
        token,
    );

    PipelineServices::new()
        .with_scorer(Arc::new(scorer))
        .with_fetcher(Arc::new(Pub2ToolsCli::new(config.pub2tools.clone())))
        .with_scraper(Arc::new(HttpHomepageScraper::new(&config.enrichment.homepage)))
        .with_enricher(Arc::new(EuropePmcClient::new(config.enrichment.europe_pmc.clone())))
        .with_biotools(Arc::new(biotools))
}

fn load_config(config_path: Option<&Path>) -> Option<AnnotateConfig> {
    match AnnotateConfig::load(config_path) {
        Ok(config) => Some(config),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            None
        }
    }
}

fn print_summary(summary: &RunSummary) {
    println!("Run {} finished in {:.1}s", summary.label, summary.duration.as_secs_f64());
    println!(
        "  {} candidates: {} add, {} review, {} do-not-add",
        summary.total, summary.add, summary.review, summary.do_not_add
    );
    if summary.scoring_resumed {
        println!("  Scores reused from an earlier report");
    }
    if summary.llm_fallbacks > 0 || summary.health_fallbacks > 0 {
        println!(
            "  Heuristic fallbacks: {} per-candidate, {} health",
            summary.llm_fallbacks, summary.health_fallbacks
        );
    }
    println!("  Report:         {}", summary.report.display());
    println!("  Add payload:    {}", summary.payload.display());
    println!("  Review payload: {}", summary.review_payload.display());
}

pub async fn handle_run(args: &RunArgs, config_path: Option<&Path>, quiet: bool) -> i32 {
    let Some(mut config) = load_config(config_path) else {
        return 1;
    };
    apply_run_args(&mut config, args);
    if let Err(e) = config.validate() {
        error!("{}", e);
        eprintln!("Error: {}", e);
        return 1;
    }

    let pipeline = config.to_pipeline_config();
    let paths = match RunPaths::resolve(&pipeline) {
        Ok(paths) => paths,
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    };
    debug!("Resolved run paths: {:?}", paths);
    config.write_snapshot(&paths.config_snapshot());

    let services = build_services(&config, &paths);
    let handler = build_handler(ProgressMode::from_env(), !args.no_progress && !quiet);
    let status = Arc::new(PipelineStatus::new(Arc::from(handler)));
    let mut context = PipelineContext::new(pipeline, paths, status, services);

    match PipelineOrchestrator::new().execute(&mut context).await {
        Ok(summary) => {
            if !quiet {
                print_summary(&summary);
            }
            0
        }
        Err(e) => {
            error!("Pipeline failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            1
        }
    }
}

pub async fn handle_health(args: &HealthArgs, config_path: Option<&Path>) -> i32 {
    let Some(config) = load_config(config_path) else {
        return 1;
    };
    let host = args.host.clone().unwrap_or(config.ollama.host);
    let model = args.model.clone().unwrap_or(config.ollama.model);

    info!("Checking Ollama at {}", host);
    let client = OllamaClient::new(OllamaConfig {
        host: host.clone(),
        model: model.clone(),
        ..OllamaConfig::default()
    });
    let health = client.ping().await;
    if health.healthy {
        println!("Ollama at {} is healthy (model {})", host, model);
        0
    } else {
        let reason = health.error.unwrap_or_else(|| "unknown error".to_string());
        println!("Ollama at {} is unavailable: {}", host, reason);
        1
    }
}

pub async fn handle_upload(args: &UploadArgs, config_path: Option<&Path>) -> i32 {
    let Some(config) = load_config(config_path) else {
        return 1;
    };
    let entries = match load_payload(&args.payload) {
        Ok(entries) => entries,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return 1;
        }
    };
    info!("Loaded {} entries from {}", entries.len(), args.payload.display());

    if args.dry_run {
        let (valid, failures) = Validator::new().validate_payload(&entries, "Upload payload");
        println!(
            "Dry run: {} of {} entries pass local validation; nothing uploaded",
            valid.len(),
            entries.len()
        );
        for failure in &failures {
            warn!("{:?}", failure);
        }
        return 0;
    }

    let token_file = args.token_file.clone().unwrap_or(config.biotools.token_file.clone());
    let Some(token) = read_token(Some(token_file.as_path())) else {
        eprintln!("Error: no bio.tools token found in {}", token_file.display());
        return 1;
    };

    let api = BioToolsApi::new(
        config.biotools.api_base.clone(),
        config.biotools.validate_url.clone(),
        Some(token),
    );
    let report = upload_entries(&api, &entries, config.biotools.retry_policy()).await;

    let dir = args
        .payload
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    match write_upload_report_csv(&report, dir) {
        Ok(path) => info!("Upload report written to {}", path.display()),
        Err(e) => warn!("Failed to write upload report: {:#}", e),
    }

    let failed = report.count(UploadStatus::Failed);
    println!(
        "Uploaded {}, skipped {}, failed {}",
        report.count(UploadStatus::Uploaded),
        report.count(UploadStatus::Skipped),
        failed
    );
    if failed > 0 {
        1
    } else {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::PipelineConfig;
    use chrono::Utc;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_run_args_override_config() {
        let mut config = AnnotateConfig::default();
        config.pipeline.offline = true;
        let args = RunArgs {
            from_date: Some("30d".to_string()),
            bio_add: Some(0.8),
            concurrency: Some(3),
            input: Some(PathBuf::from("candidates.json")),
            no_europe_pmc: true,
            model: Some("mistral".to_string()),
            ..RunArgs::default()
        };
        apply_run_args(&mut config, &args);

        assert_eq!(config.pipeline.from_date, "30d");
        assert_eq!(config.pipeline.bio_thresholds.add, 0.8);
        assert_eq!(config.pipeline.concurrency, 3);
        assert_eq!(config.pipeline.input, Some(PathBuf::from("candidates.json")));
        assert!(config.pipeline.offline);
        assert!(!config.enrichment.europe_pmc.enabled);
        assert!(config.enrichment.homepage.enabled);
        assert_eq!(config.ollama.model, "mistral");
    }

    #[test]
    fn test_build_services_wires_everything() {
        let config = AnnotateConfig::default();
        let pipeline = PipelineConfig::new().with_output_root("/tmp/out");
        let paths = RunPaths::with_label(&pipeline, "custom_tool_set".to_string(), Utc::now(), None);
        let services = build_services(&config, &paths);

        assert_eq!(services.scorer.as_ref().map(|s| s.model()), Some("llama3.2"));
        assert!(services.fetcher.is_some());
        assert!(services.scraper.is_some());
        assert!(services.enricher.is_some());
        assert!(services.biotools.is_some());
    }

    #[tokio::test]
    async fn test_upload_dry_run_never_needs_token() {
        let dir = TempDir::new().unwrap();
        let payload = dir.path().join("payload.json");
        std::fs::write(
            &payload,
            r#"[{"name": "ToolX", "description": "Aligns reads.", "homepage": "https://toolx.org"}]"#,
        )
        .unwrap();
        let args = UploadArgs {
            payload,
            token_file: Some(dir.path().join("missing_token")),
            dry_run: true,
        };
        assert_eq!(handle_upload(&args, None).await, 0);
    }

    #[tokio::test]
    async fn test_upload_without_token_fails() {
        let dir = TempDir::new().unwrap();
        let payload = dir.path().join("payload.json");
        std::fs::write(&payload, "[]").unwrap();
        let args = UploadArgs {
            payload,
            token_file: Some(dir.path().join("missing_token")),
            dry_run: false,
        };
        assert_eq!(handle_upload(&args, None).await, 1);
    }

    #[tokio::test]
    async fn test_run_offline_with_input() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("candidates.json");
        std::fs::write(&input, r#"[{"title": "GeneTool", "homepage": "https://genetool.org"}]"#).unwrap();
        let config_file = dir.path().join("config.yaml");
        std::fs::write(&config_file, "").unwrap();

        let args = RunArgs {
            input: Some(input),
            offline: true,
            output_root: Some(dir.path().join("out")),
            no_progress: true,
            ..RunArgs::default()
        };
        assert_eq!(handle_run(&args, Some(&config_file), true).await, 0);

        let root = dir.path().join("out").join("custom_tool_set");
        assert!(root.join("reports").join("assessment.jsonl").exists());
        assert!(root.join("config.generated.yaml").exists());
    }
}
