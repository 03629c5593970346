use crate::biotools::BioToolsApi;
use crate::output::{generate_biotools_id, strip_null_fields, write_json, write_jsonl, write_report_csv, DecisionRow};
use crate::pipeline::context::PipelineContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::progress::Stage;
use crate::validation::{ValidationFailure, Validator};
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

type Entry = Map<String, Value>;

/// Writes the assessment report, validates both payloads and writes them
/// unless the run is a dry run.
pub struct OutputPhase;

fn strip_entry(entry: Entry) -> Entry {
    match strip_null_fields(Value::Object(entry)) {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Looks every report row up in the live registry.
pub async fn annotate_with_registry(rows: &mut [DecisionRow], api: &BioToolsApi) {
    info!("Validating payload entries against live bio.tools API...");
    for row in rows.iter_mut() {
        let existing = row
            .identity("id")
            .or_else(|| row.identity("biotools_id"))
            .map(str::to_string);
        let tool_id = match existing {
            Some(id) => Some(id),
            None => {
                let generated = row
                    .title
                    .as_deref()
                    .map(generate_biotools_id)
                    .filter(|g| !g.is_empty());
                if let Some(id) = &generated {
                    debug!("Generated biotoolsID '{}' from tool name", id);
                    row.id = Some(id.clone());
                }
                generated
            }
        };

        let Some(tool_id) = tool_id else {
            row.biotools_api_status = Some("no_id".to_string());
            continue;
        };

        match api.fetch_entry(&tool_id).await {
            Ok(None) => row.biotools_api_status = Some("not_found".to_string()),
            Ok(Some(entry)) => {
                let text = |key: &str| {
                    entry
                        .get(key)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                row.biotools_api_status = Some("ok".to_string());
                row.api_name = Some(text("name"));
                row.api_status = Some(text("status"));
                row.api_description = Some(text("description"));
            }
            Err(e) => row.biotools_api_status = Some(format!("error: {}", e)),
        }
    }
}

/// Splits a payload into valid entries and failures, using the registry's
/// validation endpoint when allowed and the local rules otherwise.
pub async fn validate_payload(
    entries: &[Entry],
    payload_type: &str,
    remote: Option<&BioToolsApi>,
    validator: &Validator,
) -> (Vec<Entry>, Vec<ValidationFailure>) {
    if let Some(api) = remote {
        info!(payload = payload_type, "Validating payload using bio.tools API");
        let mut valid = Vec::new();
        let mut failures = Vec::new();
        let mut auth_failed = false;
        for entry in entries {
            let result = api.validate_entry(entry).await;
            if result.is_auth_failure() {
                auth_failed = true;
                break;
            }
            if result.valid {
                valid.push(entry.clone());
            } else {
                failures.push(ValidationFailure::new(entry, result.errors));
            }
        }
        if !auth_failed {
            return (valid, failures);
        }
        warn!("bio.tools API rejected the token; falling back to local validation");
    }
    validator.validate_payload(entries, payload_type)
}

fn write_failures(path: &std::path::Path, add: Vec<ValidationFailure>, review: Vec<ValidationFailure>) -> Result<()> {
    let tagged: Vec<ValidationFailure> = add
        .into_iter()
        .map(|f| (f, "add"))
        .chain(review.into_iter().map(|f| (f, "review")))
        .map(|(mut failure, kind)| {
            failure.payload_type = Some(kind.to_string());
            failure
        })
        .collect();
    info!("Writing schema validation errors to {}", path.display());
    write_jsonl(path, &tagged)
}

#[async_trait]
impl WorkflowPhase for OutputPhase {
    async fn execute(&self, context: &mut PipelineContext) -> Result<()> {
        let api = context.services.biotools.clone();
        if context.config.validate_biotools_api {
            match api.as_deref() {
                Some(api) => annotate_with_registry(&mut context.rows, api).await,
                None => warn!("bio.tools API validation requested but no API client is configured"),
            }
        }

        context
            .status
            .set_status(Stage::Output, "OUTPUT – writing reports", false);
        let paths = context.paths.clone();
        info!("Writing report to {}", paths.report.display());
        write_jsonl(&paths.report, &context.rows).context("Failed to write assessment report")?;
        info!("Writing CSV report to {}", paths.report_csv.display());
        write_report_csv(&paths.report_csv, &context.rows).context("Failed to write CSV report")?;

        let add: Vec<Entry> = std::mem::take(&mut context.add_entries)
            .into_iter()
            .map(strip_entry)
            .collect();
        let review: Vec<Entry> = std::mem::take(&mut context.review_entries)
            .into_iter()
            .map(strip_entry)
            .collect();

        let remote = api
            .as_deref()
            .filter(|api| context.config.validate_biotools_api && api.has_token());
        let validator = context.services.validator.clone();
        let (add_valid, add_errors) = validate_payload(&add, "Add payload", remote, &validator).await;
        let (review_valid, review_errors) =
            validate_payload(&review, "Review payload", remote, &validator).await;

        if !add_errors.is_empty() || !review_errors.is_empty() {
            if let Err(e) = write_failures(&paths.validation_errors, add_errors, review_errors) {
                warn!(error = %e, "Failed to write validation errors");
            }
        }

        if context.config.dry_run {
            info!("Dry run: payload files not written");
            context
                .status
                .set_status(Stage::Output, "OUTPUT – dry-run (payloads skipped)", false);
        } else {
            context
                .status
                .set_status(Stage::Output, "OUTPUT – writing payloads", false);
            info!(
                "OUTPUT add payload -> {} ({}/{} valid)",
                paths.payload.display(),
                add_valid.len(),
                add.len()
            );
            write_json(&paths.payload, &add_valid).context("Failed to write add payload")?;
            info!(
                "OUTPUT review payload -> {} ({}/{} valid)",
                paths.review_payload.display(),
                review_valid.len(),
                review.len()
            );
            write_json(&paths.review_payload, &review_valid).context("Failed to write review payload")?;
        }

        context.add_entries = add_valid;
        context.review_entries = review_valid;
        info!("Pipeline run complete");
        context
            .status
            .set_status(Stage::Output, "OUTPUT – complete", false);
        Ok(())
    }
}
