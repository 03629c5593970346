//! Candidate tool records
//!
//! A [`Candidate`] is one prospective bio.tools entry as produced by the
//! extraction tool. The fields the pipeline reads are typed; everything else
//! is carried in [`Candidate::extra`] and round-tripped untouched so that it
//! reaches the payload output verbatim.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, warn};

/// Identity keys, in lookup order.
pub const IDENTITY_KEYS: [&str; 5] = ["id", "tool_id", "biotools_id", "biotoolsID", "identifier"];

const PUBLICATION_HOSTS: &[&str] = &[
    "doi.org",
    "dx.doi.org",
    "pubmed.ncbi.nlm.nih.gov",
    "europepmc.org",
    "academic.oup.com",
    "nature.com",
    "sciencedirect.com",
    "link.springer.com",
    "springer.com",
    "onlinelibrary.wiley.com",
    "biorxiv.org",
    "medrxiv.org",
    "arxiv.org",
    "frontiersin.org",
    "mdpi.com",
    "journals.plos.org",
    "biomedcentral.com",
    "cell.com",
    "tandfonline.com",
    "science.org",
    "pnas.org",
    "ieeexplore.ieee.org",
    "dl.acm.org",
    "researchgate.net",
    "semanticscholar.org",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub tool_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub biotools_id: Option<String>,

    /// Registry identifier in the casing bio.tools uses.
    #[serde(
        rename = "biotoolsID",
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient::opt_string"
    )]
    pub registry_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub identifier: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub homepage: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient::string_list")]
    pub urls: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient::string_list")]
    pub tags: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub published_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publication: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publications: Option<Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty", deserialize_with = "lenient::string_list")]
    pub publication_ids: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub publication_abstract: Option<String>,

    /// HTTP status code or free-form status text from the homepage probe.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub homepage_status: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_string")]
    pub homepage_error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_bool")]
    pub in_biotools: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "lenient::opt_bool")]
    pub in_biotools_name: Option<bool>,

    /// Fields the pipeline never interprets.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Candidate {
    /// Display title: `title`, then `name`.
    pub fn display_title(&self) -> Option<&str> {
        non_empty(self.title.as_deref()).or_else(|| non_empty(self.name.as_deref()))
    }

    /// Value of one of the [`IDENTITY_KEYS`].
    pub fn identity(&self, key: &str) -> Option<&str> {
        let value = match key {
            "id" => self.id.as_deref(),
            "tool_id" => self.tool_id.as_deref(),
            "biotools_id" => self.biotools_id.as_deref(),
            "biotoolsID" => self.registry_id.as_deref(),
            "identifier" => self.identifier.as_deref(),
            _ => None,
        };
        non_empty(value)
    }

    /// First identity value in [`IDENTITY_KEYS`] order.
    pub fn primary_id(&self) -> Option<&str> {
        IDENTITY_KEYS.iter().find_map(|key| self.identity(key))
    }

    /// Identifier used for the payload's `biotoolsID`.
    pub fn payload_id(&self) -> Option<&str> {
        ["biotoolsID", "biotools_id", "id", "tool_id", "identifier"]
            .iter()
            .find_map(|key| self.identity(key))
    }

    /// `pmcid`/`pmid`/`doi` values formatted as `kind:value`, deduplicated in order.
    pub fn publication_identifiers(&self) -> Vec<String> {
        let source = match (&self.publication, &self.publications) {
            (Some(value), _) if is_truthy(value) => Some(value),
            (_, Some(value)) if is_truthy(value) => Some(value),
            _ => None,
        };

        let records: Vec<&Map<String, Value>> = match source {
            Some(Value::Object(map)) => vec![map],
            Some(Value::Array(items)) => items.iter().filter_map(Value::as_object).collect(),
            _ => Vec::new(),
        };

        let mut identifiers: Vec<String> = Vec::new();
        for record in records {
            for key in ["pmcid", "pmid", "doi"] {
                if let Some(value) = record.get(key).and_then(Value::as_str) {
                    let value = value.trim();
                    if value.is_empty() {
                        continue;
                    }
                    let formatted = format!("{}:{}", key, value);
                    if !identifiers.contains(&formatted) {
                        identifiers.push(formatted);
                    }
                }
            }
        }
        identifiers
    }

    /// Input fields that contributed evidence for scoring.
    pub fn origin_types(&self) -> Vec<String> {
        let mapping: [(&str, &str); 11] = [
            ("title", "title"),
            ("description", "description"),
            ("homepage", "homepage"),
            ("documentation", "documentation"),
            ("repository", "repository"),
            ("tags", "tags"),
            ("published_at", "publication"),
            ("publication_abstract", "publication_abstract"),
            ("publication_full_text", "publication_full_text"),
            ("publication_full_text_url", "publication_full_text_url"),
            ("publication_ids", "publication_ids"),
        ];

        mapping
            .iter()
            .filter(|(key, _)| self.has_value(key))
            .map(|(_, label)| label.to_string())
            .collect()
    }

    fn has_value(&self, key: &str) -> bool {
        match key {
            "title" => has_text(self.title.as_deref()),
            "description" => has_text(self.description.as_deref()),
            "homepage" => has_text(self.homepage.as_deref()),
            "tags" => self.tags.iter().any(|t| !t.trim().is_empty()),
            "published_at" => has_text(self.published_at.as_deref()),
            "publication_abstract" => has_text(self.publication_abstract.as_deref()),
            "publication_ids" => self.publication_ids.iter().any(|p| !p.trim().is_empty()),
            other => match self.extra.get(other) {
                None | Some(Value::Null) => false,
                Some(Value::String(s)) => !s.trim().is_empty(),
                Some(Value::Array(items)) => items.iter().any(|item| match item {
                    Value::String(s) => !s.trim().is_empty(),
                    Value::Null => false,
                    _ => true,
                }),
                Some(_) => true,
            },
        }
    }

    /// Prefers a non-publication homepage, falling back to the first usable url.
    pub fn normalize_homepage(&mut self) {
        if let Some(homepage) = self.homepage.as_deref() {
            let homepage = normalize_url(homepage);
            if !homepage.is_empty() && !is_probable_publication_url(&homepage) {
                self.homepage = Some(homepage);
                return;
            }
        }
        if let Some(alternative) = primary_homepage(&self.urls) {
            self.homepage = Some(alternative);
        }
    }

    /// Lowercased title plus the primary url, used to collapse duplicates.
    pub fn dedup_key(&self) -> (String, String) {
        let title = self
            .display_title()
            .map(|t| t.trim().to_lowercase())
            .unwrap_or_default();
        let homepage = primary_homepage(&self.urls)
            .or_else(|| self.homepage.clone())
            .map(|h| h.trim_end_matches('/').to_lowercase())
            .unwrap_or_default();
        (title, homepage)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

fn has_text(value: Option<&str>) -> bool {
    non_empty(value).is_some()
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}

/// Trims and turns protocol-relative `//host` urls into `https://host`.
pub fn normalize_url(url: &str) -> String {
    let url = url.trim();
    match url.strip_prefix("//") {
        Some(rest) => format!("https://{}", rest),
        None => url.to_string(),
    }
}

/// First absolute http(s) url that is not a publication link.
pub fn primary_homepage<S: AsRef<str>>(urls: &[S]) -> Option<String> {
    urls.iter()
        .map(|u| normalize_url(u.as_ref()))
        .filter(|u| u.starts_with("http://") || u.starts_with("https://"))
        .find(|u| !is_probable_publication_url(u))
}

/// Journal, DOI and literature-database links.
pub fn is_probable_publication_url(url: &str) -> bool {
    let lowered = url.trim().to_lowercase();
    if lowered.is_empty() {
        return false;
    }
    if lowered.starts_with("doi:") || lowered.starts_with("10.") {
        return true;
    }

    let without_scheme = lowered
        .strip_prefix("https://")
        .or_else(|| lowered.strip_prefix("http://"))
        .unwrap_or(&lowered);
    let (host, path) = match without_scheme.find('/') {
        Some(idx) => (&without_scheme[..idx], &without_scheme[idx..]),
        None => (without_scheme, ""),
    };
    let host = host.strip_prefix("www.").unwrap_or(host);

    if PUBLICATION_HOSTS
        .iter()
        .any(|known| host == *known || host.ends_with(&format!(".{}", known)))
    {
        return true;
    }
    if host.ends_with("ncbi.nlm.nih.gov") && (path.starts_with("/pmc") || path.starts_with("/pubmed")) {
        return true;
    }
    path.contains("/doi/")
}

/// Loads candidates from a JSON list or an object with a `list` key.
///
/// Missing, unreadable or malformed files produce an empty list. Non-object
/// items are skipped.
pub fn load_candidates(path: &Path) -> Vec<Candidate> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Candidate input not readable");
            return Vec::new();
        }
    };

    let data: Value = match serde_json::from_str(&content) {
        Ok(data) => data,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Candidate input is not valid JSON");
            return Vec::new();
        }
    };

    let items = match data {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("list") {
            Some(Value::Array(items)) => items,
            _ => Vec::new(),
        },
        _ => Vec::new(),
    };

    items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| match serde_json::from_value::<Candidate>(item) {
            Ok(mut candidate) => {
                candidate.normalize_homepage();
                Some(candidate)
            }
            Err(e) => {
                warn!(error = %e, "Skipping malformed candidate");
                None
            }
        })
        .collect()
}

/// Deserializers that accept the loose typing found in extraction exports.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(value.and_then(|v| scalar_to_string(&v)))
    }

    pub fn opt_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Bool(b)) => Some(b),
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            _ => None,
        })
    }

    pub fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
            Some(other) => scalar_to_string(&other).into_iter().collect(),
            None => Vec::new(),
        })
    }

    fn scalar_to_string(value: &Value) -> Option<String> {
        match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}
