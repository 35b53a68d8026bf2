use serde::Serialize;
use serde_json::{json, Value};
use ytx_core::Role;

use super::{error_message, ProviderAdapter};
use crate::config::LlmProvider;
use crate::request::{GenerationRequest, HttpRequestSpec};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Claude (Anthropic) Messages API.
pub struct ClaudeAdapter {
    base_url: String,
}

impl ClaudeAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl ProviderAdapter for ClaudeAdapter {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Claude
    }

    fn build_request(&self, req: &GenerationRequest, model: &str) -> HttpRequestSpec {
        let messages: Vec<ClaudeMessage<'_>> = req
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| ClaudeMessage {
                role: m.role.as_str(),
                content: &m.content,
            })
            .collect();

        let mut body = json!({
            "model": model,
            "max_tokens": req.max_tokens,
            "stream": true,
            "messages": messages,
        });

        if let Some(sys) = req.system() {
            body["system"] = json!(sys);
        }

        HttpRequestSpec {
            url: format!("{}/v1/messages", self.base_url.trim_end_matches('/')),
            headers: vec![
                ("x-api-key".into(), req.api_key.clone()),
                ("anthropic-version".into(), ANTHROPIC_VERSION.into()),
                ("content-type".into(), "application/json".into()),
            ],
            body,
        }
    }

    fn extract_delta_text(&self, event: &Value) -> Option<String> {
        if event["type"].as_str() != Some("content_block_delta") {
            return None;
        }
        event["delta"]["text"].as_str().map(ToString::to_string)
    }

    fn is_stream_end(&self, event: &Value) -> bool {
        event["type"].as_str() == Some("message_stop")
    }

    fn extract_stream_error(&self, event: &Value) -> Option<String> {
        if event["type"].as_str() != Some("error") {
            return None;
        }
        error_message(&event["error"]).or_else(|| Some("stream error".into()))
    }
}

// -- Claude wire types --

#[derive(Serialize)]
struct ClaudeMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use ytx_core::ChatMessage;

    fn adapter() -> ClaudeAdapter {
        ClaudeAdapter::new("https://api.anthropic.com/")
    }

    #[test]
    fn test_build_request() {
        let req = GenerationRequest::new(LlmProvider::Claude, "sk-ant", "SUMMARY")
            .with_system_prompt("be brief")
            .with_messages(vec![ChatMessage::user("hi"), ChatMessage::assistant("hello")])
            .with_max_tokens(100);
        let spec = adapter().build_request(&req, "claude-sonnet-4-6");

        assert_eq!(spec.url, "https://api.anthropic.com/v1/messages");
        assert_eq!(spec.header("x-api-key"), Some("sk-ant"));
        assert_eq!(spec.header("anthropic-version"), Some("2023-06-01"));
        assert_eq!(spec.body["model"], "claude-sonnet-4-6");
        assert_eq!(spec.body["max_tokens"], 100);
        assert_eq!(spec.body["stream"], true);
        assert_eq!(spec.body["system"], "be brief");
        assert_eq!(spec.body["messages"][1]["role"], "assistant");
    }

    #[test]
    fn test_no_system_field_without_prompt() {
        let req = GenerationRequest::new(LlmProvider::Claude, "k", "CARDS")
            .with_messages(vec![ChatMessage::user("x")]);
        let spec = adapter().build_request(&req, "claude-sonnet-4-6");
        assert!(spec.body.get("system").is_none());
    }

    #[test]
    fn test_extract_delta_and_stop() {
        let a = adapter();
        let delta = json!({"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}});
        assert_eq!(a.extract_delta_text(&delta).as_deref(), Some("Hi"));
        assert_eq!(a.extract_delta_text(&json!({"type":"message_start"})), None);
        assert_eq!(a.extract_delta_text(&json!([1, 2])), None);
        assert!(a.is_stream_end(&json!({"type":"message_stop"})));
        assert!(!a.is_stream_end(&json!({"type":"message_delta"})));
    }

    #[test]
    fn test_in_stream_error() {
        let a = adapter();
        let ev = json!({"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}});
        assert_eq!(a.extract_stream_error(&ev).as_deref(), Some("Overloaded"));
        assert_eq!(a.extract_stream_error(&json!({"type":"ping"})), None);
    }
}
