//! Deterministic scorers that never call the language model

use super::homepage::RejectionReason;
use super::types::{truncate_chars, Scores, SubScores, BIO_KEYS, DOC_KEYS};
use crate::candidate::{primary_homepage, Candidate};
use serde_json::{json, Map};

pub const HEURISTIC_MODEL: &str = "heuristic";
pub const NO_HOMEPAGE_MODEL: &str = "rule:no-homepage";
pub const MAX_DESCRIPTION_CHARS: usize = 280;

const BIO_TAGS: [&str; 4] = ["genomics", "bioinformatics", "proteomics", "metabolomics"];

fn concise_description(candidate: &Candidate) -> String {
    truncate_chars(
        candidate.description.as_deref().unwrap_or("").trim(),
        MAX_DESCRIPTION_CHARS,
    )
}

/// Keyword scorer used offline and whenever the model is unavailable.
pub fn simple_scores(candidate: &Candidate) -> Scores {
    let title = candidate.title.as_deref().unwrap_or("").to_lowercase();
    let tags: Vec<String> = candidate.tags.iter().map(|t| t.to_lowercase()).collect();

    let bio_kw = title.contains("gene")
        || title.contains("genom")
        || title.contains("bio")
        || BIO_TAGS.iter().any(|k| tags.iter().any(|t| t == k));
    let has_homepage = primary_homepage(&candidate.urls).is_some();

    let bio = if bio_kw { 0.8 } else { 0.4 };
    let docs = if has_homepage { 0.8 } else { 0.1 };
    let confidence = if docs >= 0.5 { 0.6 } else { 0.3 };

    let bio_subscores = if bio_kw {
        SubScores::from_pairs([
            ("A1", 1.0),
            ("A2", 0.5),
            ("A3", 0.5),
            ("A4", if has_homepage { 1.0 } else { 0.0 }),
            ("A5", 0.5),
        ])
    } else {
        SubScores::zeros(&BIO_KEYS)
    };

    let doc_subscores = if has_homepage {
        SubScores::from_pairs([("B1", 1.0), ("B2", 1.0), ("B3", 0.5), ("B4", 0.5), ("B5", 0.5)])
    } else {
        SubScores::zeros(&DOC_KEYS)
    };

    Scores {
        bio_score: Some(bio),
        bio_subscores: Some(bio_subscores),
        documentation_score: Some(docs),
        documentation_subscores: Some(doc_subscores),
        concise_description: concise_description(candidate),
        rationale: "heuristic pre-LLM scoring".to_string(),
        confidence_score: confidence,
        model: HEURISTIC_MODEL.to_string(),
        ..Default::default()
    }
}

/// All-zero scores for candidates without a usable homepage.
///
/// Fills `candidate.publication_ids` when it was empty.
pub fn zero_scores(candidate: &mut Candidate, homepage: &str, reason: RejectionReason) -> Scores {
    if candidate.publication_ids.is_empty() {
        candidate.publication_ids = candidate.publication_identifiers();
    }

    let tool_name = [&candidate.title, &candidate.name, &candidate.tool_id]
        .iter()
        .find_map(|v| v.as_deref().filter(|s| !s.is_empty()))
        .unwrap_or("")
        .to_string();

    let mut model_params = Map::new();
    model_params.insert("reason".to_string(), json!(reason.as_str()));

    Scores {
        tool_name,
        homepage: Some(homepage.to_string()),
        publication_ids: candidate.publication_ids.clone(),
        bio_score: Some(0.0),
        bio_subscores: Some(SubScores::zeros(&BIO_KEYS)),
        documentation_score: Some(0.0),
        documentation_subscores: Some(SubScores::zeros(&DOC_KEYS)),
        concise_description: concise_description(candidate),
        rationale: reason.rationale().to_string(),
        model: NO_HOMEPAGE_MODEL.to_string(),
        model_params,
        origin_types: candidate.origin_types(),
        confidence_score: 0.1,
        ..Default::default()
    }
}
