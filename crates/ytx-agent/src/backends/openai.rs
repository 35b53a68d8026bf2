use serde_json::{json, Value};

use super::ProviderAdapter;
use crate::config::LlmProvider;
use crate::request::{GenerationRequest, HttpRequestSpec};

/// OpenAI Chat Completions API.
///
/// There is no separate system field; the system prompt travels as the first
/// message.
pub struct OpenAiAdapter {
    base_url: String,
}

impl OpenAiAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl ProviderAdapter for OpenAiAdapter {
    fn provider(&self) -> LlmProvider {
        LlmProvider::OpenAi
    }

    fn build_request(&self, req: &GenerationRequest, model: &str) -> HttpRequestSpec {
        let mut messages = Vec::with_capacity(req.messages.len() + 1);
        if let Some(sys) = req.system() {
            messages.push(json!({"role": "system", "content": sys}));
        }
        messages.extend(
            req.messages
                .iter()
                .map(|m| json!({"role": m.role.as_str(), "content": m.content})),
        );

        HttpRequestSpec {
            url: format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/')),
            headers: vec![
                ("authorization".into(), format!("Bearer {}", req.api_key)),
                ("content-type".into(), "application/json".into()),
            ],
            body: json!({
                "model": model,
                "max_completion_tokens": req.max_tokens,
                "stream": true,
                "messages": messages,
            }),
        }
    }

    fn extract_delta_text(&self, event: &Value) -> Option<String> {
        event["choices"][0]["delta"]["content"]
            .as_str()
            .map(ToString::to_string)
    }

    fn is_stream_end(&self, event: &Value) -> bool {
        event["choices"][0]["finish_reason"].as_str() == Some("stop")
    }
}
