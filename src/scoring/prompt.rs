//! Scoring prompt templates

use crate::candidate::Candidate;

const MAX_ABSTRACT_CHARS: usize = 4000;

/// Base prompt for rating one candidate.
pub const SCORING_PROMPT: &str = r#"You are curating the bio.tools registry of bioinformatics software. Decide whether the candidate below is a genuine bioinformatics tool and how well it is documented.

Candidate:
- Title: {title}
- Description: {description}
- Homepage: {homepage}
- URLs: {urls}
- Tags: {tags}
- Publication IDs: {publication_ids}
- Publication abstract: {abstract}

Score each criterion from 0.0 to 1.0.

Bio relevance (bio_subscores):
- A1: addresses a biological or biomedical problem
- A2: operates on biological data (sequences, structures, images, omics)
- A3: targets life-science users
- A4: is an installable or runnable piece of software
- A5: is distinct from a database, dataset or pure method paper

Documentation (documentation_subscores):
- B1: the homepage documents the tool
- B2: installation or execution instructions exist
- B3: source code, container or versioned release is available
- B4: usage examples or tutorials exist
- B5: license and contact or support information exist

Answer with a single JSON object and nothing else:
{
  "tool_name": "<name>",
  "homepage": "<homepage url>",
  "publication_ids": ["<kind>:<value>"],
  "bio_subscores": {"A1": 0.0, "A2": 0.0, "A3": 0.0, "A4": 0.0, "A5": 0.0},
  "documentation_subscores": {"B1": 0.0, "B2": 0.0, "B3": 0.0, "B4": 0.0, "B5": 0.0},
  "concise_description": "<at most 280 characters>",
  "rationale": "<one or two sentences>",
  "confidence_score": 0.0
}"#;

/// Appended to the base prompt when the previous answer failed validation.
pub const REPAIR_SUFFIX: &str = r#"

Your previous answer could not be used:
{errors}

Return the corrected JSON object only, with every field present and every score between 0.0 and 1.0."#;

pub fn render_scoring_prompt(candidate: &Candidate, homepage: &str) -> String {
    let publication_ids = if candidate.publication_ids.is_empty() {
        candidate.publication_identifiers()
    } else {
        candidate.publication_ids.clone()
    };
    let abstract_text: String = candidate
        .publication_abstract
        .as_deref()
        .unwrap_or("")
        .chars()
        .take(MAX_ABSTRACT_CHARS)
        .collect();

    SCORING_PROMPT
        .replace("{title}", or_none(candidate.display_title().unwrap_or("")))
        .replace("{description}", or_none(candidate.description.as_deref().unwrap_or("")))
        .replace("{homepage}", or_none(homepage))
        .replace("{urls}", or_none(&candidate.urls.join(", ")))
        .replace("{tags}", or_none(&candidate.tags.join(", ")))
        .replace("{publication_ids}", or_none(&publication_ids.join(", ")))
        .replace("{abstract}", or_none(abstract_text.trim()))
}

pub fn render_repair_prompt(base_prompt: &str, errors: &[String]) -> String {
    let listed: Vec<String> = errors.iter().map(|e| format!("- {}", e)).collect();
    format!("{}{}", base_prompt, REPAIR_SUFFIX.replace("{errors}", &listed.join("\n")))
}

fn or_none(value: &str) -> &str {
    if value.trim().is_empty() {
        "(none)"
    } else {
        value
    }
}
