//! Structural bio.tools schema checks for payload entries

pub mod rules;
pub mod validator;

pub use validator::{ValidationFailure, Validator};
