//! Add / review / reject policy
//!
//! Classification is a pure function of a [`Scores`] record, the threshold
//! pairs and homepage availability. The only side effect is the v2
//! documentation score annotation on the record itself.

use super::types::{coerce_unit_score, Scores, DOC_KEYS};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::OnceLock;

/// Weights for `B1`..`B5`; missing keys contribute 0.
pub const DOC_WEIGHTS: [(&str, f64); 5] = [("B1", 2.0), ("B2", 1.0), ("B3", 1.0), ("B4", 1.0), ("B5", 2.0)];

/// Fixed divisor of the weighted documentation mean. The result is clamped
/// to 1.0, so a full set of top sub-scores saturates.
pub const DOC_WEIGHT_DENOMINATOR: f64 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionCategory {
    Add,
    Review,
    DoNotAdd,
}

impl DecisionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionCategory::Add => "add",
            DecisionCategory::Review => "review",
            DecisionCategory::DoNotAdd => "do_not_add",
        }
    }
}

impl fmt::Display for DecisionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Older reports stored `include` as a boolean.
impl<'de> Deserialize<'de> for DecisionCategory {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        match Value::deserialize(deserializer)? {
            Value::Bool(true) => Ok(DecisionCategory::Add),
            Value::Bool(false) => Ok(DecisionCategory::DoNotAdd),
            Value::String(s) => match s.as_str() {
                "add" => Ok(DecisionCategory::Add),
                "review" => Ok(DecisionCategory::Review),
                "do_not_add" => Ok(DecisionCategory::DoNotAdd),
                other => Err(serde::de::Error::custom(format!(
                    "unknown decision category '{}'",
                    other
                ))),
            },
            other => Err(serde::de::Error::custom(format!(
                "invalid decision category {}",
                other
            ))),
        }
    }
}

/// `(review, add)` threshold pair for one axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Thresholds {
    pub review: f64,
    pub add: f64,
}

impl Thresholds {
    /// Clamps both to [0, 1] and lowers `review` to `add` when inverted.
    pub fn new(review: f64, add: f64) -> Self {
        let add = coerce_unit_score(Some(add));
        let review = coerce_unit_score(Some(review)).min(add);
        Self { review, add }
    }

    pub fn bio_default() -> Self {
        Self::new(0.5, 0.6)
    }

    pub fn doc_default() -> Self {
        Self::new(0.5, 0.6)
    }
}

/// Recomputes the weighted documentation score and stores it on `scores`.
///
/// Falls back to the flat `documentation_score` when no `B` key is present.
/// The pre-existing score is preserved once in `documentation_score_raw`.
pub fn apply_doc_score_v2(scores: &mut Scores) -> f64 {
    let mut numerator = 0.0;
    let mut have_any = false;

    if let Some(subscores) = &scores.documentation_subscores {
        for (key, weight) in DOC_WEIGHTS {
            numerator += subscores.unit(key) * weight;
            if subscores.contains_key(key) {
                have_any = true;
            }
        }
    }

    let v2 = if have_any {
        coerce_unit_score(Some(numerator / DOC_WEIGHT_DENOMINATOR))
    } else {
        coerce_unit_score(scores.documentation_score)
    };

    if let Some(existing) = scores.documentation_score {
        if scores.documentation_score_raw.is_none() && existing != v2 {
            scores.documentation_score_raw = Some(existing);
        }
    }

    scores.doc_score_v2 = Some(v2);
    scores.documentation_score = Some(v2);
    v2
}

/// Classifies a scored candidate.
///
/// `add` additionally requires an execution path (`B2 >= 0.5` or
/// `A4 >= 0.99`) and a reproducibility anchor (`B3 >= 0.5`); without them an
/// otherwise add-worthy candidate is sent to review.
pub fn classify(
    scores: &mut Scores,
    bio: Thresholds,
    doc: Thresholds,
    has_homepage: bool,
) -> DecisionCategory {
    apply_doc_score_v2(scores);

    if !has_homepage {
        return DecisionCategory::DoNotAdd;
    }

    let bio_score = coerce_unit_score(scores.bio_score);
    let doc_score = coerce_unit_score(scores.documentation_score);

    let has_execution_path = scores.doc_unit("B2") >= 0.5 || scores.bio_unit("A4") >= 0.99;
    let has_repro_anchor = scores.doc_unit("B3") >= 0.5;

    if bio_score >= bio.add && doc_score >= doc.add {
        if has_execution_path && has_repro_anchor {
            return DecisionCategory::Add;
        }
        return DecisionCategory::Review;
    }

    if bio_score >= bio.review && doc_score >= doc.review {
        return DecisionCategory::Review;
    }

    DecisionCategory::DoNotAdd
}

/// HTTP status recorded for a homepage. Numbers are taken as-is (floats
/// truncate, out-of-range values are kept), text must lead with three digits.
pub fn parse_status_code(value: Option<&Value>) -> Option<i64> {
    static STATUS: OnceLock<Regex> = OnceLock::new();

    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(text) => {
            let text = text.trim();
            let pattern = STATUS.get_or_init(|| Regex::new(r"^(\d{3})").expect("valid regex"));
            pattern
                .captures(text)
                .and_then(|caps| caps.get(1))
                .and_then(|m| m.as_str().parse().ok())
        }
        _ => None,
    }
}

/// A homepage is unusable when empty, answered >= 400, or errored.
pub fn homepage_is_usable(homepage: Option<&str>, status: Option<&Value>, error: Option<&str>) -> bool {
    if homepage.map(str::trim).unwrap_or("").is_empty() {
        return false;
    }
    if matches!(parse_status_code(status), Some(code) if code >= 400) {
        return false;
    }
    if error.map(|e| !e.trim().is_empty()).unwrap_or(false) {
        return false;
    }
    true
}

/// Zeroes documentation when the homepage cannot back it up.
pub fn apply_documentation_penalty(scores: &mut Scores, homepage_ok: bool) {
    if homepage_ok {
        return;
    }
    scores.documentation_score = Some(0.0);
    if let Some(subscores) = scores.documentation_subscores.as_mut() {
        for key in DOC_KEYS {
            if subscores.contains_key(key) {
                subscores.set(key, 0.0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scoring::types::SubScores;
    use serde_json::json;

    fn scores(bio: f64, doc: &[(&str, f64)], a4: f64) -> Scores {
        Scores {
            bio_score: Some(bio),
            bio_subscores: Some(SubScores::from_pairs([("A4", a4)])),
            documentation_subscores: Some(SubScores::from_pairs(doc.iter().copied())),
            ..Default::default()
        }
    }

    fn add_thresholds() -> (Thresholds, Thresholds) {
        (Thresholds::new(0.5, 0.6), Thresholds::new(0.5, 0.6))
    }

    #[test]
    fn test_doc_v2_weighted_mean() {
        let mut s = scores(0.8, &[("B1", 1.0), ("B2", 1.0), ("B3", 0.5), ("B4", 0.5), ("B5", 1.0)], 0.0);
        let v2 = apply_doc_score_v2(&mut s);
        assert!((v2 - 6.0 / 6.0).abs() < 1e-9);
        assert_eq!(s.doc_score_v2, Some(v2));
        assert_eq!(s.documentation_score, Some(v2));
    }

    #[test]
    fn test_doc_v2_missing_keys_count_as_zero() {
        let mut s = scores(0.8, &[("B1", 1.0)], 0.0);
        let v2 = apply_doc_score_v2(&mut s);
        assert!((v2 - 2.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_doc_v2_falls_back_to_flat_score() {
        let mut s = Scores {
            documentation_score: Some(0.7),
            documentation_subscores: Some(SubScores::new()),
            ..Default::default()
        };
        assert_eq!(apply_doc_score_v2(&mut s), 0.7);
        assert!(s.documentation_score_raw.is_none());

        let mut s = Scores {
            documentation_score: Some(1.4),
            ..Default::default()
        };
        assert_eq!(apply_doc_score_v2(&mut s), 1.0);
        assert_eq!(s.documentation_score_raw, Some(1.4));
    }

    #[test]
    fn test_doc_v2_raw_preserved_once() {
        let mut s = scores(0.8, &[("B1", 1.0)], 0.0);
        s.documentation_score = Some(0.9);
        apply_doc_score_v2(&mut s);
        assert_eq!(s.documentation_score_raw, Some(0.9));

        s.documentation_subscores = Some(SubScores::from_pairs([("B1", 0.0)]));
        apply_doc_score_v2(&mut s);
        assert_eq!(s.documentation_score_raw, Some(0.9));
        assert_eq!(s.documentation_score, Some(0.0));
    }

    #[test]
    fn test_doc_v2_idempotent() {
        let mut once = scores(0.8, &[("B1", 0.5), ("B3", 1.0)], 0.0);
        once.documentation_score = Some(0.2);
        apply_doc_score_v2(&mut once);
        let mut twice = once.clone();
        apply_doc_score_v2(&mut twice);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_no_homepage_is_never_added() {
        let (bio, doc) = add_thresholds();
        let mut s = scores(1.0, &[("B1", 1.0), ("B2", 1.0), ("B3", 1.0), ("B4", 1.0), ("B5", 1.0)], 1.0);
        assert_eq!(classify(&mut s, bio, doc, false), DecisionCategory::DoNotAdd);
        assert_eq!(s.doc_score_v2, Some(1.0));
    }

    #[test]
    fn test_add_requires_execution_and_repro() {
        let (bio, doc) = add_thresholds();
        let mut s = scores(0.9, &[("B1", 1.0), ("B2", 0.0), ("B3", 0.0), ("B4", 1.0), ("B5", 1.0)], 0.5);
        // v2 = (2 + 0 + 0 + 1 + 2) / 6 = 0.833
        assert_eq!(classify(&mut s, bio, doc, true), DecisionCategory::Review);
    }

    #[test]
    fn test_a4_provides_execution_path() {
        let (bio, doc) = add_thresholds();
        let mut s = scores(0.9, &[("B1", 1.0), ("B2", 0.0), ("B3", 0.5), ("B4", 1.0), ("B5", 1.0)], 1.0);
        assert_eq!(classify(&mut s, bio, doc, true), DecisionCategory::Add);
    }

    #[test]
    fn test_review_band_and_reject() {
        let (bio, doc) = add_thresholds();
        let mut s = scores(0.55, &[("B1", 1.0), ("B2", 1.0), ("B3", 1.0), ("B4", 1.0), ("B5", 1.0)], 1.0);
        assert_eq!(classify(&mut s, bio, doc, true), DecisionCategory::Review);

        let mut s = scores(0.2, &[("B1", 1.0), ("B2", 1.0), ("B3", 1.0), ("B4", 1.0), ("B5", 1.0)], 1.0);
        assert_eq!(classify(&mut s, bio, doc, true), DecisionCategory::DoNotAdd);
    }

    #[test]
    fn test_thresholds_normalized() {
        let t = Thresholds::new(0.9, 0.4);
        assert_eq!(t.review, 0.4);
        assert_eq!(t.add, 0.4);

        let t = Thresholds::new(-1.0, 2.0);
        assert_eq!(t.review, 0.0);
        assert_eq!(t.add, 1.0);
    }

    #[test]
    fn test_parse_status_code() {
        assert_eq!(parse_status_code(Some(&json!(404))), Some(404));
        assert_eq!(parse_status_code(Some(&json!(200.0))), Some(200));
        assert_eq!(parse_status_code(Some(&json!("503 Service Unavailable"))), Some(503));
        assert_eq!(parse_status_code(Some(&json!("ok"))), None);
        assert_eq!(parse_status_code(Some(&json!(true))), None);
        assert_eq!(parse_status_code(None), None);
        assert_eq!(parse_status_code(Some(&json!(70000))), Some(70000));
        assert_eq!(parse_status_code(Some(&json!(-1))), Some(-1));
        assert_eq!(parse_status_code(Some(&json!(404.9))), Some(404));
    }

    #[test]
    fn test_out_of_range_status_is_unusable() {
        assert!(!homepage_is_usable(Some("https://a.org"), Some(&json!(70000)), None));
        assert!(!homepage_is_usable(Some("https://a.org"), Some(&json!("70000")), None));
        assert!(!homepage_is_usable(Some("https://a.org"), Some(&json!(u64::MAX)), None));
        assert!(homepage_is_usable(Some("https://a.org"), Some(&json!(-1)), None));
    }

    #[test]
    fn test_homepage_is_usable() {
        assert!(homepage_is_usable(Some("https://a.org"), Some(&json!(200)), None));
        assert!(homepage_is_usable(Some("https://a.org"), None, Some("  ")));
        assert!(!homepage_is_usable(Some("  "), None, None));
        assert!(!homepage_is_usable(None, None, None));
        assert!(!homepage_is_usable(Some("https://a.org"), Some(&json!("404")), None));
        assert!(!homepage_is_usable(Some("https://a.org"), None, Some("timeout")));
    }

    #[test]
    fn test_penalty_zeroes_present_keys_only() {
        let mut s = scores(0.8, &[("B1", 1.0), ("B3", 0.5)], 0.0);
        s.documentation_score = Some(0.9);
        apply_documentation_penalty(&mut s, false);
        let doc = s.documentation_subscores.as_ref().unwrap();
        assert_eq!(doc.get("B1"), Some(0.0));
        assert_eq!(doc.get("B3"), Some(0.0));
        assert!(!doc.contains_key("B2"));
        assert_eq!(s.documentation_score, Some(0.0));
    }

    #[test]
    fn test_decision_category_accepts_legacy_bool() {
        let c: DecisionCategory = serde_json::from_value(json!(true)).unwrap();
        assert_eq!(c, DecisionCategory::Add);
        let c: DecisionCategory = serde_json::from_value(json!("do_not_add")).unwrap();
        assert_eq!(c, DecisionCategory::DoNotAdd);
        assert_eq!(serde_json::to_value(DecisionCategory::Review).unwrap(), json!("review"));
    }
}
