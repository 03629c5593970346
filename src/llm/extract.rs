//! Streaming response assembly and JSON object recovery

use serde::Deserialize;

/// Concatenated fields of a newline-delimited streaming response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamText {
    pub response: String,
    pub thinking: String,
}

impl StreamText {
    /// The answer, or the reasoning text for models that never emit one.
    pub fn effective_output(&self) -> &str {
        if self.response.is_empty() {
            &self.thinking
        } else {
            &self.response
        }
    }
}

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    thinking: Option<String>,
}

/// Joins `response` and `thinking` across all parseable lines.
pub fn collect_stream(body: &str) -> StreamText {
    let mut text = StreamText::default();
    for line in body.trim().lines() {
        let Ok(chunk) = serde_json::from_str::<StreamChunk>(line) else {
            continue;
        };
        if let Some(response) = chunk.response {
            text.response.push_str(&response);
        }
        if let Some(thinking) = chunk.thinking {
            text.thinking.push_str(&thinking);
        }
    }
    text
}

/// Substring from the first `{` to the last `}` if it parses as JSON.
pub fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let candidate = &text[start..=end];
    serde_json::from_str::<serde_json::Value>(candidate)
        .ok()
        .map(|_| candidate.to_string())
}

/// Tries the effective output first, then the raw body.
pub fn recover_json(stream: &StreamText, raw_body: &str) -> Option<String> {
    extract_json_object(stream.effective_output()).or_else(|| extract_json_object(raw_body))
}
