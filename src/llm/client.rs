use super::error::LlmError;
use super::trace::{TracePayload, TraceStatus};
use async_trait::async_trait;
use serde_json::Value;

/// Attempt metadata copied into the trace record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceContext {
    pub attempt: Option<u32>,
    pub prompt_kind: String,
}

impl Default for TraceContext {
    fn default() -> Self {
        Self {
            attempt: None,
            prompt_kind: "base".to_string(),
        }
    }
}

impl TraceContext {
    pub fn new(attempt: u32, prompt_kind: impl Into<String>) -> Self {
        Self {
            attempt: Some(attempt),
            prompt_kind: prompt_kind.into(),
        }
    }
}

/// One generation request. Unset sampling parameters use the client defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateRequest {
    pub prompt: String,
    pub model: Option<String>,
    pub temperature: Option<f64>,
    pub top_p: Option<f64>,
    pub seed: Option<i64>,
    pub trace_context: TraceContext,
}

impl GenerateRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_seed(mut self, seed: Option<i64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_trace_context(mut self, context: TraceContext) -> Self {
        self.trace_context = context;
        self
    }
}

/// A recovered JSON object and the trace state of the call that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
    pub json_text: String,
    pub trace: TracePayload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthStatus {
    pub healthy: bool,
    pub error: Option<String>,
}

impl HealthStatus {
    pub fn healthy() -> Self {
        Self {
            healthy: true,
            error: None,
        }
    }

    pub fn unhealthy(error: impl Into<String>) -> Self {
        Self {
            healthy: false,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerateRequest) -> Result<Generation, LlmError>;

    /// Reachability probe. Never fails; problems are reported in the status.
    async fn ping(&self) -> HealthStatus;

    /// Appends a structured trace record for a finished attempt.
    fn write_trace_entry(
        &self,
        _payload: &TracePayload,
        _status: TraceStatus,
        _response_json: Option<&Value>,
        _schema_errors: &[String],
    ) {
    }

    fn name(&self) -> &str;

    fn model_info(&self) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestGenerator;

    #[async_trait]
    impl TextGenerator for TestGenerator {
        async fn generate(&self, request: GenerateRequest) -> Result<Generation, LlmError> {
            Ok(Generation {
                json_text: "{}".to_string(),
                trace: TracePayload::new(
                    &request.prompt,
                    Default::default(),
                    request.trace_context.attempt,
                    &request.trace_context.prompt_kind,
                ),
            })
        }

        async fn ping(&self) -> HealthStatus {
            HealthStatus::healthy()
        }

        fn name(&self) -> &str {
            "TestGenerator"
        }
    }

    #[tokio::test]
    async fn test_generator_trait() {
        let generator = TestGenerator;
        assert_eq!(generator.name(), "TestGenerator");
        assert!(generator.model_info().is_none());
        assert!(generator.ping().await.healthy);

        let out = generator
            .generate(GenerateRequest::new("hi").with_trace_context(TraceContext::new(2, "repair")))
            .await
            .unwrap();
        assert_eq!(out.trace.attempt, Some(2));
        assert_eq!(out.trace.prompt_kind, "repair");
    }

    #[test]
    fn test_default_trace_context_is_base() {
        let request = GenerateRequest::new("p");
        assert_eq!(request.trace_context.prompt_kind, "base");
        assert_eq!(request.trace_context.attempt, None);
    }
}
