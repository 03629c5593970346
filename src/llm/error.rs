//! Language model error taxonomy
//!
//! Callers branch on the variant instead of inspecting messages: only
//! [`LlmError::Connection`] is worth retrying, a [`LlmError::Generation`]
//! failure means the model answered but nothing JSON-shaped was recoverable.

use super::trace::TracePayload;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum LlmError {
    /// Endpoint unreachable, DNS failure, timeout, or an HTTP error status
    #[error("Connection failure: {message}")]
    Connection { message: String },

    /// Endpoint answered but no JSON object could be extracted
    #[error("Generation failure: {message}")]
    Generation {
        message: String,
        trace: Box<TracePayload>,
    },
}

impl LlmError {
    pub fn connection(message: impl Into<String>) -> Self {
        LlmError::Connection {
            message: message.into(),
        }
    }

    pub fn generation(message: impl Into<String>, trace: TracePayload) -> Self {
        LlmError::Generation {
            message: message.into(),
            trace: Box::new(trace),
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, LlmError::Connection { .. })
    }

    pub fn trace(&self) -> Option<&TracePayload> {
        match self {
            LlmError::Generation { trace, .. } => Some(trace),
            LlmError::Connection { .. } => None,
        }
    }
}
