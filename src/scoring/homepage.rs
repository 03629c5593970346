//! Homepage resolution for scoring
//!
//! Candidates without a usable non-publication homepage can never reach
//! `add` or `review`, so they are routed to the zero-score rule instead of
//! the language model.

use crate::candidate::{is_probable_publication_url, primary_homepage, Candidate};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// A homepage or url existed but only pointed at literature.
    PublicationUrl,
    /// No candidate url at all.
    MissingHomepage,
}

impl RejectionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectionReason::PublicationUrl => "publication_url",
            RejectionReason::MissingHomepage => "missing_homepage",
        }
    }

    pub fn rationale(&self) -> &'static str {
        match self {
            RejectionReason::PublicationUrl => {
                "Homepage unavailable for scoring (only publication links)."
            }
            RejectionReason::MissingHomepage => {
                "Homepage unavailable for scoring (no homepage provided)."
            }
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Picks the homepage to score against, updating `candidate.homepage`.
///
/// On failure the homepage field is cleared and an empty string is returned
/// together with the reason.
pub fn resolve_scoring_homepage(candidate: &mut Candidate) -> (String, Option<RejectionReason>) {
    let raw_homepage = candidate
        .homepage
        .as_deref()
        .map(str::trim)
        .unwrap_or("")
        .to_string();
    let urls: Vec<String> = candidate.urls.iter().map(|u| u.trim().to_string()).collect();

    if !raw_homepage.is_empty() && !is_probable_publication_url(&raw_homepage) {
        candidate.homepage = Some(raw_homepage.clone());
        return (raw_homepage, None);
    }

    if let Some(alternative) = primary_homepage(&urls) {
        candidate.homepage = Some(alternative.clone());
        return (alternative, None);
    }

    candidate.homepage = None;
    if !raw_homepage.is_empty() || urls.iter().any(|u| is_probable_publication_url(u)) {
        return (String::new(), Some(RejectionReason::PublicationUrl));
    }
    (String::new(), Some(RejectionReason::MissingHomepage))
}
