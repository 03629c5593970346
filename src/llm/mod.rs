//! Language model client layer
//!
//! [`TextGenerator`] is the seam between scoring and the inference server.
//! [`OllamaClient`] is the production implementation and [`MockGenerator`]
//! serves scripted responses in tests.

mod client;
mod error;
pub mod extract;
mod mock;
mod ollama;
pub mod trace;

pub use client::{GenerateRequest, Generation, HealthStatus, TextGenerator, TraceContext};
pub use error::LlmError;
pub use mock::{MockGenerator, MockResponse, RecordedTrace};
pub use ollama::{OllamaClient, OllamaConfig, DEFAULT_HOST, DEFAULT_MODEL};
pub use trace::{TracePayload, TraceStatus};
