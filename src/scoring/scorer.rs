//! LLM-backed candidate scorer
//!
//! Renders the scoring prompt, validates the model's JSON answer and turns it
//! into [`Scores`]. An answer that fails validation is traced as a schema
//! error and the prompt is re-sent in `repair` form until `max_attempts` is
//! reached. Transport and extraction failures from the generator end the
//! attempt loop immediately; the caller falls back to heuristics.

use super::heuristic::MAX_DESCRIPTION_CHARS;
use super::prompt::{render_repair_prompt, render_scoring_prompt};
use super::types::{number_from_value, truncate_chars, Scores, SubScores, BIO_KEYS, DOC_KEYS};
use crate::candidate::Candidate;
use crate::llm::{GenerateRequest, LlmError, TextGenerator, TraceContext, TraceStatus};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum ScoreError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error("Response failed schema validation: {}", errors.join("; "))]
    Schema { errors: Vec<String> },

    #[error("Response is not valid JSON: {0}")]
    InvalidJson(String),
}

pub struct Scorer {
    generator: Arc<dyn TextGenerator>,
    model: String,
    max_attempts: u32,
    temperature: Option<f64>,
    top_p: Option<f64>,
    seed: Option<i64>,
}

impl Scorer {
    pub fn new(generator: Arc<dyn TextGenerator>, model: impl Into<String>) -> Self {
        Self {
            generator,
            model: model.into(),
            max_attempts: 2,
            temperature: None,
            top_p: None,
            seed: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_sampling(mut self, temperature: Option<f64>, top_p: Option<f64>, seed: Option<i64>) -> Self {
        self.temperature = temperature;
        self.top_p = top_p;
        self.seed = seed;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn generator(&self) -> &Arc<dyn TextGenerator> {
        &self.generator
    }

    pub async fn score_candidate(&self, candidate: &Candidate, homepage: &str) -> Result<Scores, ScoreError> {
        let base_prompt = render_scoring_prompt(candidate, homepage);
        let mut last_failure = ScoreError::Schema { errors: Vec::new() };

        for attempt in 1..=self.max_attempts {
            let (prompt, kind) = match &last_failure {
                ScoreError::Schema { errors } if attempt > 1 => {
                    (render_repair_prompt(&base_prompt, errors), "repair")
                }
                ScoreError::InvalidJson(message) if attempt > 1 => {
                    (render_repair_prompt(&base_prompt, &[message.clone()]), "repair")
                }
                _ => (base_prompt.clone(), "base"),
            };

            let mut request = GenerateRequest::new(prompt)
                .with_model(self.model.clone())
                .with_seed(self.seed)
                .with_trace_context(TraceContext::new(attempt, kind));
            if let Some(t) = self.temperature {
                request = request.with_temperature(t);
            }
            if let Some(p) = self.top_p {
                request = request.with_top_p(p);
            }

            let generation = self.generator.generate(request).await?;

            let value: Value = match serde_json::from_str(&generation.json_text) {
                Ok(value) => value,
                Err(e) => {
                    let message = format!("response: invalid JSON ({})", e);
                    self.generator.write_trace_entry(
                        &generation.trace,
                        TraceStatus::SchemaError,
                        None,
                        std::slice::from_ref(&message),
                    );
                    last_failure = ScoreError::InvalidJson(message);
                    continue;
                }
            };

            let errors = validate_response(&value);
            if !errors.is_empty() {
                warn!(
                    attempt,
                    max_attempts = self.max_attempts,
                    errors = errors.len(),
                    "LLM response failed validation"
                );
                self.generator.write_trace_entry(
                    &generation.trace,
                    TraceStatus::SchemaError,
                    Some(&value),
                    &errors,
                );
                last_failure = ScoreError::Schema { errors };
                continue;
            }

            self.generator
                .write_trace_entry(&generation.trace, TraceStatus::Ok, Some(&value), &[]);
            debug!(attempt, "LLM response accepted");
            return Ok(self.build_scores(candidate, homepage, &value, attempt));
        }

        Err(last_failure)
    }

    fn build_scores(&self, candidate: &Candidate, homepage: &str, value: &Value, attempts: u32) -> Scores {
        let bio_subscores: SubScores = value
            .get("bio_subscores")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        let documentation_subscores: Option<SubScores> = value
            .get("documentation_subscores")
            .and_then(|v| serde_json::from_value(v.clone()).ok());

        let bio_score = value
            .get("bio_score")
            .and_then(number_from_value)
            .unwrap_or_else(|| bio_subscores.mean_over(&BIO_KEYS));

        let tool_name = string_field(value, "tool_name")
            .or_else(|| candidate.display_title().map(str::to_string))
            .unwrap_or_default();

        let mut publication_ids = candidate.publication_identifiers();
        if publication_ids.is_empty() {
            publication_ids = candidate.publication_ids.clone();
        }

        let mut model_params = Map::new();
        model_params.insert("temperature".to_string(), self.temperature.into());
        model_params.insert("top_p".to_string(), self.top_p.into());
        model_params.insert("seed".to_string(), self.seed.into());
        model_params.insert("attempts".to_string(), attempts.into());

        Scores {
            tool_name,
            homepage: Some(homepage.to_string()),
            publication_ids,
            bio_score: Some(bio_score),
            bio_subscores: Some(bio_subscores),
            documentation_score: value.get("documentation_score").and_then(number_from_value),
            documentation_subscores,
            confidence_score: value
                .get("confidence_score")
                .and_then(number_from_value)
                .map(|c| c.clamp(0.0, 1.0))
                .unwrap_or(0.0),
            concise_description: truncate_chars(
                string_field(value, "concise_description").as_deref().unwrap_or(""),
                MAX_DESCRIPTION_CHARS,
            ),
            rationale: string_field(value, "rationale").unwrap_or_default(),
            model: self.model.clone(),
            model_params,
            origin_types: candidate.origin_types(),
            ..Default::default()
        }
    }
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Structural checks on a model answer, as `field: message` strings.
pub fn validate_response(value: &Value) -> Vec<String> {
    let mut errors = Vec::new();
    let Some(object) = value.as_object() else {
        errors.push("response: expected a JSON object".to_string());
        return errors;
    };

    for (field, keys) in [("bio_subscores", &BIO_KEYS), ("documentation_subscores", &DOC_KEYS)] {
        match object.get(field) {
            Some(Value::Object(scores)) => {
                for key in keys.iter() {
                    match scores.get(*key) {
                        None | Some(Value::Null) => errors.push(format!("{}.{}: missing", field, key)),
                        Some(Value::Number(n)) => match n.as_f64() {
                            Some(v) if (0.0..=1.0).contains(&v) => {}
                            _ => errors.push(format!("{}.{}: must be between 0 and 1", field, key)),
                        },
                        Some(_) => errors.push(format!("{}.{}: must be a number", field, key)),
                    }
                }
            }
            Some(_) => errors.push(format!("{}: must be an object", field)),
            None => errors.push(format!("{}: missing", field)),
        }
    }

    for field in ["tool_name", "concise_description", "rationale"] {
        if let Some(v) = object.get(field) {
            if !v.is_string() && !v.is_null() {
                errors.push(format!("{}: must be a string", field));
            }
        }
    }

    if let Some(v) = object.get("confidence_score") {
        match v.as_f64() {
            Some(c) if (0.0..=1.0).contains(&c) => {}
            Some(_) => errors.push("confidence_score: must be between 0 and 1".to_string()),
            None if v.is_null() => {}
            None => errors.push("confidence_score: must be a number".to_string()),
        }
    }

    if let Some(v) = object.get("publication_ids") {
        if !v.is_array() && !v.is_null() {
            errors.push("publication_ids: must be a list".to_string());
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{MockGenerator, MockResponse};
    use serde_json::json;

    fn good_response() -> Value {
        json!({
            "tool_name": "ARCTIC-3D",
            "homepage": "https://github.com/haddocking/arctic3d",
            "publication_ids": [],
            "bio_subscores": {"A1": 1.0, "A2": 1.0, "A3": 0.5, "A4": 1.0, "A5": 0.5},
            "documentation_subscores": {"B1": 1.0, "B2": 1.0, "B3": 0.5, "B4": 0.5, "B5": 1.0},
            "concise_description": "Clusters protein interface residues.",
            "rationale": "Installable software with docs.",
            "confidence_score": 0.9
        })
    }

    fn candidate() -> Candidate {
        Candidate {
            title: Some("ARCTIC-3D".to_string()),
            description: Some("Interface clustering".to_string()),
            homepage: Some("https://github.com/haddocking/arctic3d".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_score_candidate_success() {
        let generator = Arc::new(MockGenerator::new());
        generator.add_response(MockResponse::json(good_response()));
        let scorer = Scorer::new(generator.clone(), "llama3.2").with_sampling(Some(0.1), None, Some(7));

        let scores = scorer
            .score_candidate(&candidate(), "https://github.com/haddocking/arctic3d")
            .await
            .unwrap();

        assert_eq!(scores.tool_name, "ARCTIC-3D");
        assert!((scores.bio_score.unwrap() - 0.8).abs() < 1e-9);
        assert_eq!(scores.model, "llama3.2");
        assert_eq!(scores.model_params["seed"], 7);
        assert_eq!(scores.model_params["attempts"], 1);
        assert!(scores.documentation_score.is_none());
        assert_eq!(scores.origin_types, vec!["title", "description", "homepage"]);

        let traces = generator.traces();
        assert_eq!(traces.len(), 1);
        assert_eq!(traces[0].status, TraceStatus::Ok);
    }

    #[tokio::test]
    async fn test_schema_error_triggers_repair() {
        let generator = Arc::new(MockGenerator::new());
        generator.add_response(MockResponse::json(json!({"bio_subscores": {"A1": 2.0}})));
        generator.add_response(MockResponse::json(good_response()));
        let scorer = Scorer::new(generator.clone(), "m");

        let scores = scorer.score_candidate(&candidate(), "https://x.org").await.unwrap();
        assert_eq!(scores.model_params["attempts"], 2);

        let requests = generator.requests();
        assert_eq!(requests[1].trace_context.prompt_kind, "repair");
        assert!(requests[1].prompt.contains("bio_subscores.A1: must be between 0 and 1"));

        let traces = generator.traces();
        assert_eq!(traces[0].status, TraceStatus::SchemaError);
        assert!(!traces[0].schema_errors.is_empty());
        assert_eq!(traces[1].status, TraceStatus::Ok);
    }

    #[tokio::test]
    async fn test_attempts_exhausted() {
        let generator = Arc::new(MockGenerator::new());
        generator.add_responses(vec![
            MockResponse::json(json!({"x": 1})),
            MockResponse::json(json!({"x": 2})),
        ]);
        let scorer = Scorer::new(generator, "m").with_max_attempts(2);

        let err = scorer.score_candidate(&candidate(), "https://x.org").await.unwrap_err();
        assert!(matches!(err, ScoreError::Schema { .. }));
    }

    #[tokio::test]
    async fn test_generator_failure_is_not_repaired() {
        let generator = Arc::new(MockGenerator::new());
        generator.add_response(MockResponse::error(LlmError::connection("refused")));
        generator.add_response(MockResponse::json(good_response()));
        let scorer = Scorer::new(generator.clone(), "m");

        let err = scorer.score_candidate(&candidate(), "https://x.org").await.unwrap_err();
        assert!(matches!(err, ScoreError::Llm(_)));
        assert_eq!(generator.remaining_responses(), 1);
    }

    #[test]
    fn test_validate_response() {
        assert!(validate_response(&good_response()).is_empty());
        assert_eq!(validate_response(&json!([])), vec!["response: expected a JSON object"]);

        let errors = validate_response(&json!({
            "bio_subscores": {"A1": "high"},
            "documentation_subscores": [],
            "confidence_score": 3
        }));
        assert!(errors.contains(&"bio_subscores.A1: must be a number".to_string()));
        assert!(errors.contains(&"bio_subscores.A2: missing".to_string()));
        assert!(errors.contains(&"documentation_subscores: must be an object".to_string()));
        assert!(errors.contains(&"confidence_score: must be between 0 and 1".to_string()));
    }
}
