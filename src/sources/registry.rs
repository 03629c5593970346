//! Registry membership checks against a bio.tools dump

use crate::candidate::normalize_url;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const REGISTRY_FILE: &str = "biotools.json";

#[derive(Debug, Clone, Default)]
pub struct RegistryIndex {
    names: HashSet<String>,
    entries: HashSet<(String, String)>,
}

fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

fn homepage_key(homepage: &str) -> String {
    normalize_url(homepage).trim_end_matches('/').to_lowercase()
}

impl RegistryIndex {
    pub fn insert(&mut self, name: &str, homepage: Option<&str>) {
        let name = name_key(name);
        if name.is_empty() {
            return;
        }
        if let Some(homepage) = homepage.map(homepage_key).filter(|h| !h.is_empty()) {
            self.entries.insert((name.clone(), homepage));
        }
        self.names.insert(name);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains_name(&self, name: Option<&str>) -> bool {
        name.map(|n| self.names.contains(&name_key(n))).unwrap_or(false)
    }

    /// Same registry entry carries both `name` and `homepage`.
    pub fn contains(&self, name: Option<&str>, homepage: Option<&str>) -> bool {
        match (name, homepage) {
            (Some(name), Some(homepage)) => self
                .entries
                .contains(&(name_key(name), homepage_key(homepage))),
            _ => false,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read registry {}", path.display()))?;
        let data: Value = serde_json::from_str(&text)
            .with_context(|| format!("Registry {} is not valid JSON", path.display()))?;
        let items = match data {
            Value::Array(items) => items,
            Value::Object(mut map) => match map.remove("list") {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };

        let mut index = Self::default();
        for item in &items {
            if let Some(name) = item.get("name").and_then(Value::as_str) {
                index.insert(name, item.get("homepage").and_then(Value::as_str));
            }
        }
        Ok(index)
    }

    /// Loads the first usable dump among `roots`; a directory root is
    /// searched for [`REGISTRY_FILE`].
    pub fn discover(roots: &[PathBuf]) -> Option<Self> {
        for root in roots {
            let path = if root.is_dir() {
                root.join(REGISTRY_FILE)
            } else {
                root.clone()
            };
            if !path.is_file() {
                debug!(path = %path.display(), "No registry dump");
                continue;
            }
            match Self::load(&path) {
                Ok(index) if !index.is_empty() => {
                    info!(path = %path.display(), entries = index.len(), "Loaded bio.tools registry");
                    return Some(index);
                }
                Ok(_) => debug!(path = %path.display(), "Registry dump is empty"),
                Err(e) => warn!(error = %e, "Registry dump unusable"),
            }
        }
        None
    }
}
