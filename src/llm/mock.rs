use super::client::{GenerateRequest, Generation, HealthStatus, TextGenerator};
use super::error::LlmError;
use super::trace::{TracePayload, TraceStatus};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// Scripted generator for tests and offline dry runs.
pub struct MockGenerator {
    responses: Mutex<VecDeque<MockResponse>>,
    health: Mutex<HealthStatus>,
    prompts: Mutex<Vec<GenerateRequest>>,
    traces: Mutex<Vec<RecordedTrace>>,
    name: String,
}

#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Raw model text; a JSON object is recovered from it like a real client.
    Text(String),
    Error(LlmError),
}

impl MockResponse {
    pub fn text(content: impl Into<String>) -> Self {
        MockResponse::Text(content.into())
    }

    pub fn json(value: Value) -> Self {
        MockResponse::Text(value.to_string())
    }

    pub fn error(error: LlmError) -> Self {
        MockResponse::Error(error)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedTrace {
    pub status: TraceStatus,
    pub prompt_kind: String,
    pub attempt: Option<u32>,
    pub schema_errors: Vec<String>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self::with_name("MockGenerator")
    }

    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            health: Mutex::new(HealthStatus::healthy()),
            prompts: Mutex::new(Vec::new()),
            traces: Mutex::new(Vec::new()),
            name: name.into(),
        }
    }

    pub fn add_response(&self, response: MockResponse) {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner).push_back(response);
    }

    pub fn add_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        let mut queue = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        for response in responses {
            queue.push_back(response);
        }
    }

    pub fn remaining_responses(&self) -> usize {
        self.responses.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn set_health(&self, status: HealthStatus) {
        *self.health.lock().unwrap_or_else(PoisonError::into_inner) = status;
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn traces(&self) -> Vec<RecordedTrace> {
        self.traces.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, request: GenerateRequest) -> Result<Generation, LlmError> {
        self.prompts.lock().unwrap_or_else(PoisonError::into_inner).push(request.clone());

        let mut trace = TracePayload::new(
            &request.prompt,
            Map::new(),
            request.trace_context.attempt,
            &request.trace_context.prompt_kind,
        );

        let response = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .ok_or_else(|| LlmError::connection("MockGenerator: No more responses in queue"))?;

        match response {
            MockResponse::Error(error) => Err(error),
            MockResponse::Text(text) => {
                trace.response_text = text.clone();
                match super::extract::extract_json_object(&text) {
                    Some(json_text) => Ok(Generation { json_text, trace }),
                    None => Err(LlmError::generation(
                        "No valid JSON object found in Ollama response",
                        trace,
                    )),
                }
            }
        }
    }

    async fn ping(&self) -> HealthStatus {
        self.health.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn write_trace_entry(
        &self,
        payload: &TracePayload,
        status: TraceStatus,
        _response_json: Option<&Value>,
        schema_errors: &[String],
    ) {
        self.traces.lock().unwrap_or_else(PoisonError::into_inner).push(RecordedTrace {
            status,
            prompt_kind: payload.prompt_kind.clone(),
            attempt: payload.attempt,
            schema_errors: schema_errors.to_vec(),
        });
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn model_info(&self) -> Option<String> {
        Some("mock-model".to_string())
    }
}

impl std::fmt::Debug for MockGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockGenerator")
            .field("name", &self.name)
            .field("remaining_responses", &self.remaining_responses())
            .finish()
    }
}
