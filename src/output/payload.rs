//! bio.tools payload entries

use crate::candidate::Candidate;
use crate::scoring::Scores;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Candidate fields that never reach a payload entry.
const TRANSIENT_FIELDS: [&str; 8] = [
    "title",
    "urls",
    "tags",
    "in_biotools",
    "in_biotools_name",
    "homepage_status",
    "homepage_error",
    "enrichment_context",
];

pub const FALLBACK_NAME: &str = "Unnamed Tool";
pub const FALLBACK_DESCRIPTION: &str = "Candidate tool from Pub2Tools";

/// Derives a registry identifier from a tool name.
///
/// Lowercases, turns spaces into `_`, drops everything outside
/// `[a-z0-9_-]`, collapses separator runs to their first character and
/// trims separators from both ends.
pub fn generate_biotools_id(tool_name: &str) -> String {
    let mut id = String::with_capacity(tool_name.len());
    let mut in_separator_run = false;

    for c in tool_name.to_lowercase().chars() {
        let c = if c == ' ' { '_' } else { c };
        match c {
            'a'..='z' | '0'..='9' => {
                id.push(c);
                in_separator_run = false;
            }
            '-' | '_' => {
                if !in_separator_run {
                    id.push(c);
                }
                in_separator_run = true;
            }
            _ => {}
        }
    }

    id.trim_matches(|c| c == '-' || c == '_').to_string()
}

/// Builds a payload entry, preserving every non-transient candidate field.
pub fn to_entry(candidate: &Candidate, homepage: Option<&str>, scores: Option<&Scores>) -> Map<String, Value> {
    let mut entry = match serde_json::to_value(candidate) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };
    for field in TRANSIENT_FIELDS {
        entry.remove(field);
    }

    let name = candidate.display_title().unwrap_or(FALLBACK_NAME);
    entry.insert("name".to_string(), Value::from(name));

    let concise = scores
        .map(|s| s.concise_description.trim())
        .filter(|d| !d.is_empty());
    if let Some(description) = concise {
        entry.insert("description".to_string(), Value::from(description));
    } else if !has_text(entry.get("description")) {
        entry.insert("description".to_string(), Value::from(FALLBACK_DESCRIPTION));
    }

    match homepage.filter(|h| !h.is_empty()) {
        Some(homepage) => {
            entry.insert("homepage".to_string(), Value::from(homepage));
        }
        None => {
            entry.entry("homepage").or_insert_with(|| Value::from(""));
        }
    }

    if !entry.contains_key("biotoolsID") {
        if let Some(id) = candidate.payload_id() {
            entry.insert("biotoolsID".to_string(), Value::from(id));
        }
    }

    entry
}

fn has_text(value: Option<&Value>) -> bool {
    matches!(value, Some(Value::String(s)) if !s.is_empty())
}

/// Removes `null` values recursively from objects and arrays.
pub fn strip_null_fields(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_null_fields(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(strip_null_fields)
                .collect(),
        ),
        other => other,
    }
}

/// `biotools_payload.json` becomes `biotools_review_payload.json`; names
/// without `payload` get a `_review` suffix on the stem.
pub fn review_payload_path(payload_path: &Path) -> PathBuf {
    let stem = payload_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("payload");
    let review_stem = if stem.contains("payload") {
        stem.replace("payload", "review_payload")
    } else {
        format!("{}_review", stem)
    };
    let file_name = match payload_path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", review_stem, ext),
        None => review_stem,
    };
    payload_path.with_file_name(file_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use yare::parameterized;

    #[parameterized(
        hyphenated = { "ARCTIC-3D", "arctic-3d" },
        double_space = { "My  Tool", "my_tool" },
        edge_separators = { "-MyTool-", "mytool" },
        empty = { "", "" },
        blank = { "   ", "" },
        special_chars = { "Tool (v2)", "tool_v2" },
        punctuation = { "My-Tool!", "my-tool" },
        mixed_run = { "a-_b", "a-b" },
    )]
    fn test_generate_biotools_id(name: &str, expected: &str) {
        assert_eq!(generate_biotools_id(name), expected);
    }

    fn candidate() -> Candidate {
        serde_json::from_value(json!({
            "name": "TestTool",
            "description": "Original description",
            "homepage": "https://example.com",
            "biotoolsID": "testtool",
            "urls": ["https://example.com"],
            "tags": ["x"],
            "homepage_status": 200,
            "in_biotools": false,
            "enrichment_context": {"a": 1},
            "topic": [{"uri": "http://edamontology.org/topic_0003", "term": "Topic"}]
        }))
        .unwrap()
    }

    #[test]
    fn test_to_entry_prefers_concise_description() {
        let scores = Scores {
            concise_description: "A concise description.".to_string(),
            ..Default::default()
        };
        let entry = to_entry(&candidate(), Some("https://example.com"), Some(&scores));

        assert_eq!(entry["description"], "A concise description.");
        assert_eq!(entry["name"], "TestTool");
        assert_eq!(entry["biotoolsID"], "testtool");
        assert!(entry.contains_key("topic"));
        for field in TRANSIENT_FIELDS {
            assert!(!entry.contains_key(field), "{} should be stripped", field);
        }
    }

    #[test]
    fn test_to_entry_description_fallbacks() {
        let blank = Scores::default();
        let entry = to_entry(&candidate(), None, Some(&blank));
        assert_eq!(entry["description"], "Original description");
        assert_eq!(entry["homepage"], "https://example.com");

        let bare = Candidate::default();
        let entry = to_entry(&bare, None, None);
        assert_eq!(entry["name"], FALLBACK_NAME);
        assert_eq!(entry["description"], FALLBACK_DESCRIPTION);
        assert_eq!(entry["homepage"], "");
        assert!(!entry.contains_key("biotoolsID"));
    }

    #[test]
    fn test_to_entry_derives_id_from_identity_fields() {
        let candidate = Candidate {
            title: Some("Tool".to_string()),
            tool_id: Some("tool-7".to_string()),
            ..Default::default()
        };
        let entry = to_entry(&candidate, Some("https://tool.org"), None);
        assert_eq!(entry["biotoolsID"], "tool-7");
        assert_eq!(entry["name"], "Tool");
    }

    #[test]
    fn test_strip_null_fields() {
        let cleaned = strip_null_fields(json!({
            "a": null,
            "b": [1, null, {"c": null, "d": 2}],
            "e": {"f": null}
        }));
        assert_eq!(cleaned, json!({"b": [1, {"d": 2}], "e": {}}));
    }

    #[test]
    fn test_review_payload_path() {
        assert_eq!(
            review_payload_path(Path::new("out/exports/biotools_payload.json")),
            PathBuf::from("out/exports/biotools_review_payload.json")
        );
        assert_eq!(
            review_payload_path(Path::new("out/entries.json")),
            PathBuf::from("out/entries_review.json")
        );
    }
}
