//! Candidate scoring and the add/review/do-not-add decision
//!
//! Scores come from one of three sources: the LLM-backed [`Scorer`], the
//! keyword heuristic in [`heuristic::simple_scores`], or the zero-score rule
//! for candidates that have no usable homepage. All three feed the same
//! [`classify`] policy.

pub mod decision;
pub mod heuristic;
pub mod homepage;
pub mod prompt;
pub mod scorer;
pub mod types;

pub use decision::{
    apply_doc_score_v2, apply_documentation_penalty, classify, homepage_is_usable,
    parse_status_code, DecisionCategory, Thresholds,
};
pub use heuristic::{simple_scores, zero_scores};
pub use homepage::{resolve_scoring_homepage, RejectionReason};
pub use scorer::{ScoreError, Scorer};
pub use types::{Scores, SubScores};
