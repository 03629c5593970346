use crate::candidate::{primary_homepage, Candidate};
use crate::output::{generate_biotools_id, to_entry, DecisionRow};
use crate::pipeline::checkpoint::CandidateIndex;
use crate::pipeline::context::PipelineContext;
use crate::pipeline::phase_trait::WorkflowPhase;
use crate::progress::{PipelineStatus, Stage};
use crate::scoring::heuristic::HEURISTIC_MODEL;
use crate::scoring::{
    apply_documentation_penalty, classify, homepage_is_usable, resolve_scoring_homepage,
    simple_scores, zero_scores, DecisionCategory, Scorer, Scores, Thresholds,
};
use anyhow::Result;
use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Scores every candidate and sorts it into add, review or do-not-add.
///
/// With a reusable assessment report the stored scores are re-classified
/// against the current thresholds instead of calling the model again.
pub struct ScorePhase;

/// Thresholds shared by every candidate in a run.
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    pub bio: Thresholds,
    pub doc: Thresholds,
}

/// Outcome for one candidate.
#[derive(Debug, Clone)]
pub struct ScoredCandidate {
    pub row: DecisionRow,
    pub decision: DecisionCategory,
    /// Payload entry for `add` and `review` decisions
    pub entry: Option<Map<String, Value>>,
    pub llm_failed: bool,
}

/// Identifier for the report row, generating a `biotoolsID` from the
/// title when the candidate has none.
fn ensure_row_id(candidate: &mut Candidate) -> Option<String> {
    if let Some(id) = candidate.primary_id() {
        return Some(id.to_string());
    }
    let generated = candidate.display_title().map(generate_biotools_id)?;
    if generated.is_empty() {
        return None;
    }
    candidate.registry_id = Some(generated.clone());
    Some(generated)
}

fn payload_entry(
    candidate: &Candidate,
    homepage: &str,
    scores: &Scores,
    decision: DecisionCategory,
) -> Option<Map<String, Value>> {
    match decision {
        DecisionCategory::Add | DecisionCategory::Review => {
            Some(to_entry(candidate, Some(homepage), Some(scores)))
        }
        DecisionCategory::DoNotAdd => None,
    }
}

/// Scores one candidate with the model when available, else heuristically.
pub async fn score_one(
    candidate: &mut Candidate,
    scorer: Option<&Scorer>,
    policy: Policy,
    status: &PipelineStatus,
) -> ScoredCandidate {
    let (homepage, rejection) = resolve_scoring_homepage(candidate);
    let mut llm_failed = false;

    let (mut scores, homepage_ok) = match rejection {
        Some(reason) => (zero_scores(candidate, &homepage, reason), false),
        None => {
            if candidate.publication_ids.is_empty() {
                candidate.publication_ids = candidate.publication_identifiers();
            }
            let scores = match scorer {
                Some(scorer) => match scorer.score_candidate(candidate, &homepage).await {
                    Ok(scores) => scores,
                    Err(e) => {
                        warn!(
                            "LLM scoring failed for '{}': {}. Using heuristic backup; rerun with --offline or check Ollama service.",
                            candidate.display_title().or(candidate.primary_id()).unwrap_or("<unknown>"),
                            e
                        );
                        status.set_status(
                            Stage::Score,
                            "SCORE – temporary LLM failure, heuristics applied",
                            false,
                        );
                        llm_failed = true;
                        simple_scores(candidate)
                    }
                },
                None => simple_scores(candidate),
            };
            let homepage_ok = homepage_is_usable(
                Some(&homepage),
                candidate.homepage_status.as_ref(),
                candidate.homepage_error.as_deref(),
            );
            (scores, homepage_ok)
        }
    };

    apply_documentation_penalty(&mut scores, homepage_ok);
    let decision = classify(&mut scores, policy.bio, policy.doc, homepage_ok);

    let row_id = ensure_row_id(candidate);
    let entry = payload_entry(candidate, &homepage, &scores, decision);
    let mut row = DecisionRow {
        id: Some(row_id.unwrap_or_default()),
        title: Some(candidate.display_title().unwrap_or("").to_string()),
        homepage: Some(homepage),
        homepage_status: candidate.homepage_status.clone(),
        homepage_error: candidate.homepage_error.clone(),
        publication_ids: candidate.publication_ids.clone(),
        scores,
        in_biotools: candidate.in_biotools,
        in_biotools_name: candidate.in_biotools_name,
        ..Default::default()
    };
    row.set_decision(decision);

    ScoredCandidate {
        row,
        decision,
        entry,
        llm_failed,
    }
}

/// Re-classifies a cached report row, pairing it with its candidate.
///
/// Returns the payload entry when the matched candidate lands in add or
/// review. Rows without a candidate keep their stored identity.
pub fn reclassify_row(
    row: &mut DecisionRow,
    candidate: Option<&mut Candidate>,
    policy: Policy,
) -> Option<Map<String, Value>> {
    let mut homepage = row.homepage.as_deref().map(str::trim).unwrap_or("").to_string();

    if let Some(candidate) = candidate.as_deref() {
        if homepage.is_empty() {
            homepage = candidate
                .homepage
                .clone()
                .or_else(|| primary_homepage(&candidate.urls))
                .unwrap_or_default();
        }
        if candidate.homepage_status.is_some() {
            row.homepage_status = candidate.homepage_status.clone();
        }
        if candidate.homepage_error.is_some() {
            row.homepage_error = candidate.homepage_error.clone();
        }
    }

    let homepage_ok = homepage_is_usable(
        Some(&homepage),
        row.homepage_status.as_ref(),
        row.homepage_error.as_deref(),
    );
    apply_documentation_penalty(&mut row.scores, homepage_ok);
    let decision = classify(&mut row.scores, policy.bio, policy.doc, homepage_ok);
    row.homepage = Some(homepage.clone());
    row.set_decision(decision);

    let candidate = candidate?;
    let has_id = ["biotoolsID", "biotools_id", "id"]
        .iter()
        .any(|key| candidate.identity(key).is_some());
    if !has_id {
        let name = candidate
            .display_title()
            .map(str::to_string)
            .or_else(|| row.title.clone());
        if let Some(generated) = name.map(|n| generate_biotools_id(&n)).filter(|g| !g.is_empty()) {
            candidate.registry_id = Some(generated.clone());
            row.id = Some(generated);
        }
    }
    row.in_biotools = candidate.in_biotools;
    row.in_biotools_name = candidate.in_biotools_name;

    payload_entry(candidate, &homepage, &row.scores, decision)
}

impl ScorePhase {
    fn policy(context: &PipelineContext) -> Policy {
        Policy {
            bio: context.config.bio_thresholds,
            doc: context.config.doc_thresholds,
        }
    }

    fn push_entry(context: &mut PipelineContext, decision: DecisionCategory, entry: Option<Map<String, Value>>) {
        match (decision, entry) {
            (DecisionCategory::Add, Some(entry)) => context.add_entries.push(entry),
            (DecisionCategory::Review, Some(entry)) => context.review_entries.push(entry),
            _ => {}
        }
    }

    fn reuse_cached(&self, context: &mut PipelineContext, cached_rows: Vec<DecisionRow>) {
        let policy = Self::policy(context);
        let mut index = CandidateIndex::build(&context.candidates);
        let mut unmatched = 0;

        for mut row in cached_rows {
            let matched = index.take_match(&row);
            let candidate = matched.map(|position| &mut context.candidates[position]);
            if candidate.is_none() {
                unmatched += 1;
            }
            let entry = reclassify_row(&mut row, candidate, policy);
            if let Some(decision) = row.category() {
                Self::push_entry(context, decision, entry);
            }
            context.rows.push(row);
        }

        if unmatched > 0 {
            warn!(
                "Resume scoring kept {} cached assessment rows without a matching enriched candidate",
                unmatched
            );
        }
        let (add, review, rejected) = context.decision_counts();
        info!(
            "RESUME scoring reused {} decisions ({} add, {} review, {} do-not-add)",
            context.rows.len(),
            add,
            review,
            rejected
        );
        context.status.set_status(
            Stage::Score,
            format!(
                "SCORE – reused cached assessment ({} add, {} review, {} do-not-add)",
                add, review, rejected
            ),
            true,
        );
        context.scoring_resumed = true;
    }

    async fn resolve_scorer(&self, context: &mut PipelineContext) -> Option<Arc<Scorer>> {
        if context.config.offline {
            if !context.candidates.is_empty() {
                context
                    .status
                    .set_status(Stage::Score, "SCORE – heuristic scoring (offline mode)", false);
            }
            return None;
        }
        let Some(scorer) = context.services.scorer.clone() else {
            warn!("No LLM scorer configured; using heuristic scoring");
            return None;
        };

        let health = scorer.generator().ping().await;
        if health.healthy {
            return Some(scorer);
        }
        context.fallbacks.health = 1;
        warn!(
            "LLM health check failed ({}). Using heuristic scoring for this run; consider --offline if repeating.",
            health.error.as_deref().unwrap_or("unknown error")
        );
        context
            .status
            .set_status(Stage::Score, "SCORE – heuristic fallback (LLM unavailable)", false);
        None
    }

    async fn score_fresh(&self, context: &mut PipelineContext) {
        let total = context.candidates.len();
        let scorer = self.resolve_scorer(context).await;
        let policy = Self::policy(context);
        let status = context.status.clone();
        let concurrency = context.config.concurrency.max(1);
        let update_interval = (total / 20).max(1);
        let start = Instant::now();

        let candidates = std::mem::take(&mut context.candidates);
        let mut scored = stream::iter(candidates.into_iter().enumerate())
            .map(|(position, mut candidate)| {
                let scorer = scorer.clone();
                let status = status.clone();
                async move {
                    let result = score_one(&mut candidate, scorer.as_deref(), policy, &status).await;
                    (position, candidate, result)
                }
            })
            .buffer_unordered(concurrency);

        let mut returned = Vec::with_capacity(total);
        let mut results = Vec::with_capacity(total);
        let mut processed = 0;
        while let Some((position, candidate, result)) = scored.next().await {
            processed += 1;
            log_llm_summary(&result.row.scores, &result.row);
            returned.push((position, candidate));
            results.push(result);
            status.update_progress(Stage::Score, processed, total);
            if processed % update_interval == 0 || processed == total {
                status.set_status(
                    Stage::Score,
                    format!("SCORE – processed {}/{} candidates", processed, total),
                    false,
                );
            }
        }
        drop(scored);
        returned.sort_by_key(|(position, _)| *position);
        context.candidates = returned.into_iter().map(|(_, candidate)| candidate).collect();

        for result in results {
            context.fallbacks.llm += usize::from(result.llm_failed);
            Self::push_entry(context, result.decision, result.entry);
            context.rows.push(result.row);
        }
        context.score_duration = start.elapsed();

        let (add, review, rejected) = context.decision_counts();
        let seconds = context.score_duration.as_secs_f64();
        info!(
            "SUMMARY score={} add={} review={} do-not-add={} llm_fallbacks={} llm_health_fail={} duration={:.2}s",
            context.rows.len(),
            add,
            review,
            rejected,
            context.fallbacks.llm,
            context.fallbacks.health,
            seconds
        );
        info!("TIMING score_elapsed_seconds={:.3}", seconds);
        status.set_status(
            Stage::Score,
            format!(
                "SCORE – complete in {:.1}s ({} add, {} review, {} do-not-add)",
                seconds, add, review, rejected
            ),
            true,
        );
    }
}

fn fmt_score(score: Option<f64>) -> String {
    score
        .map(|s| format!("{:.2}", s))
        .unwrap_or_else(|| "n/a".to_string())
}

fn log_llm_summary(scores: &Scores, row: &DecisionRow) {
    if scores.model.is_empty() || scores.model == HEURISTIC_MODEL {
        return;
    }
    let name = row
        .title
        .as_deref()
        .filter(|t| !t.is_empty())
        .or(row.id.as_deref())
        .unwrap_or("<unknown>");
    let attempts = scores
        .model_params
        .get("attempts")
        .map(Value::to_string)
        .unwrap_or_else(|| "n/a".to_string());
    info!(
        "SCORE LLM summary for '{}': attempts={} bio={} doc={}",
        name,
        attempts,
        fmt_score(scores.bio_score),
        fmt_score(scores.documentation_score)
    );
}

#[async_trait]
impl WorkflowPhase for ScorePhase {
    async fn execute(&self, context: &mut PipelineContext) -> Result<()> {
        let total = context.candidates.len();
        let cached_rows = context.cached_rows.take();

        if total == 0 {
            if cached_rows.is_some() {
                warn!("--resume-from-scoring requested but no enriched candidates were available; rerunning scoring");
            }
            info!("SCORE – skipped (no candidates)");
            context
                .status
                .set_status(Stage::Score, "SCORE – skipped (no candidates)", false);
            return Ok(());
        }

        context.status.set_status(
            Stage::Score,
            format!("SCORE – preparing {} candidates", total),
            false,
        );
        context.status.update_progress(Stage::Score, 0, total);

        match cached_rows {
            Some(rows) => self.reuse_cached(context, rows),
            None => self.score_fresh(context).await,
        }
        Ok(())
    }
}
