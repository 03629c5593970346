use crate::validation::rules::{
    BiotoolsIdRule, FunctionRule, LinkRule, PublicationRule, RequiredFieldsRule, TopicRule,
    ValidationRule,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Entry that failed validation, as written to `schema_validation_errors.jsonl`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFailure {
    pub name: String,
    #[serde(rename = "biotoolsID")]
    pub biotools_id: String,
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload_type: Option<String>,
}

impl ValidationFailure {
    pub fn new(entry: &Map<String, Value>, errors: Vec<String>) -> Self {
        let text = |key: &str| {
            entry
                .get(key)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let name = entry
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or("Unknown")
            .to_string();
        Self {
            name,
            biotools_id: text("biotoolsID"),
            errors,
            payload_type: None,
        }
    }
}

pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rules(rules: Vec<Box<dyn ValidationRule>>) -> Self {
        Self { rules }
    }

    /// All problems with one entry; empty when valid.
    pub fn validate(&self, entry: &Map<String, Value>) -> Vec<String> {
        let mut errors = Vec::new();
        for rule in &self.rules {
            rule.check(entry, &mut errors);
        }
        errors
    }

    /// Splits a payload into valid entries and failures.
    pub fn validate_payload(
        &self,
        payload: &[Map<String, Value>],
        payload_type: &str,
    ) -> (Vec<Map<String, Value>>, Vec<ValidationFailure>) {
        info!(payload = payload_type, "Validating payload using local schema");

        let mut valid = Vec::new();
        let mut failures = Vec::new();
        for entry in payload {
            let errors = self.validate(entry);
            if errors.is_empty() {
                valid.push(entry.clone());
            } else {
                let failure = ValidationFailure::new(entry, errors);
                warn!(
                    name = %failure.name,
                    id = %failure.biotools_id,
                    errors = failure.errors.len(),
                    "Local schema validation failed"
                );
                failures.push(failure);
            }
        }

        if failures.is_empty() {
            info!(payload = payload_type, entries = payload.len(), "All entries passed validation");
        } else {
            warn!(
                payload = payload_type,
                failed = failures.len(),
                total = payload.len(),
                "Entries failed validation"
            );
        }
        (valid, failures)
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self {
            rules: vec![
                Box::new(RequiredFieldsRule),
                Box::new(BiotoolsIdRule),
                Box::new(TopicRule),
                Box::new(FunctionRule),
                Box::new(LinkRule::new("link")),
                Box::new(LinkRule::new("documentation")),
                Box::new(PublicationRule),
            ],
        }
    }
}
