//! Score records produced by the scorers and persisted in the assessment report

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Bio-relevance sub-score keys.
pub const BIO_KEYS: [&str; 5] = ["A1", "A2", "A3", "A4", "A5"];

/// Documentation-quality sub-score keys.
pub const DOC_KEYS: [&str; 5] = ["B1", "B2", "B3", "B4", "B5"];

/// Clamps to [0, 1]; absent or non-finite values score 0.
pub fn coerce_unit_score(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v.clamp(0.0, 1.0),
        _ => 0.0,
    }
}

/// Named axis scores, keyed `A1`..`A5` or `B1`..`B5`.
///
/// A key is present only if the source carried a non-null value for it.
/// Non-numeric values deserialize as 0.0 but still count as present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SubScores(BTreeMap<String, f64>);

impl SubScores {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key in `keys` set to 0.0.
    pub fn zeros(keys: &[&str]) -> Self {
        Self::from_pairs(keys.iter().map(|k| (*k, 0.0)))
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, f64)>) -> Self {
        let mut scores = Self::new();
        for (key, value) in pairs {
            scores.set(key, value);
        }
        scores
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    /// Clamped value, 0.0 when absent.
    pub fn unit(&self, key: &str) -> f64 {
        coerce_unit_score(self.get(key))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn set(&mut self, key: &str, value: f64) {
        self.0.insert(key.to_string(), coerce_unit_score(Some(value)));
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Mean over `keys`, absent keys counting as 0.
    pub fn mean_over(&self, keys: &[&str]) -> f64 {
        if keys.is_empty() {
            return 0.0;
        }
        keys.iter().map(|k| self.unit(k)).sum::<f64>() / keys.len() as f64
    }
}

impl<'de> Deserialize<'de> for SubScores {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
        let mut scores = SubScores::new();
        for (key, value) in raw {
            if value.is_null() {
                continue;
            }
            scores.set(&key, number_from_value(&value).unwrap_or(0.0));
        }
        Ok(scores)
    }
}

/// Scores attached to one candidate.
///
/// `documentation_score` is overwritten by the weighted v2 value during
/// classification; a differing original value is kept in
/// `documentation_score_raw`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scores {
    #[serde(default, deserialize_with = "null_default")]
    pub tool_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage: Option<String>,

    #[serde(default, deserialize_with = "null_default")]
    pub publication_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_number")]
    pub bio_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio_subscores: Option<SubScores>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_number")]
    pub documentation_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation_subscores: Option<SubScores>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_number")]
    pub documentation_score_raw: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "opt_number")]
    pub doc_score_v2: Option<f64>,

    #[serde(default, deserialize_with = "number_or_zero")]
    pub confidence_score: f64,

    #[serde(default, deserialize_with = "null_default")]
    pub concise_description: String,

    #[serde(default, deserialize_with = "null_default")]
    pub rationale: String,

    #[serde(default, deserialize_with = "null_default")]
    pub model: String,

    #[serde(default, deserialize_with = "null_default")]
    pub model_params: Map<String, Value>,

    #[serde(default, deserialize_with = "null_default")]
    pub origin_types: Vec<String>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Scores {
    pub fn bio_unit(&self, key: &str) -> f64 {
        self.bio_subscores.as_ref().map(|s| s.unit(key)).unwrap_or(0.0)
    }

    pub fn doc_unit(&self, key: &str) -> f64 {
        self.documentation_subscores
            .as_ref()
            .map(|s| s.unit(key))
            .unwrap_or(0.0)
    }
}

/// Truncates on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

pub(crate) fn number_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn opt_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(number_from_value))
}

fn number_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_number(deserializer)?.unwrap_or(0.0))
}

fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::deserialize(deserializer)?.unwrap_or_default())
}
