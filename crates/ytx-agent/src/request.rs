use std::fmt;

use serde_json::Value;
use uuid::Uuid;
use ytx_core::ChatMessage;

use crate::config::LlmProvider;

/// Default completion budget for generation features.
pub const DEFAULT_MAX_TOKENS: u32 = 8096;

/// One generation request, consumed once by the dispatcher.
#[derive(Clone)]
pub struct GenerationRequest {
    /// Correlates log lines for this request.
    pub request_id: Uuid,
    pub provider: LlmProvider,
    pub api_key: String,
    /// Caller preference; sanitized by [`resolve_model`](crate::resolve_model).
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub messages: Vec<ChatMessage>,
    pub max_tokens: u32,
    /// Response-channel prefix, e.g. `SUMMARY` or `CARDS`.
    pub channel: String,
}

impl GenerationRequest {
    pub fn new(provider: LlmProvider, api_key: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            provider,
            api_key: api_key.into(),
            model: None,
            system_prompt: None,
            messages: Vec::new(),
            max_tokens: DEFAULT_MAX_TOKENS,
            channel: channel.into(),
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_messages(mut self, messages: Vec<ChatMessage>) -> Self {
        self.messages = messages;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// The system prompt, if present and not blank.
    pub fn system(&self) -> Option<&str> {
        self.system_prompt.as_deref().filter(|s| !s.trim().is_empty())
    }
}

impl fmt::Debug for GenerationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationRequest")
            .field("request_id", &self.request_id)
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("messages", &self.messages.len())
            .field("max_tokens", &self.max_tokens)
            .field("channel", &self.channel)
            .finish()
    }
}

/// A whole-media analysis call; served by Gemini only.
#[derive(Clone)]
pub struct MediaAnalysisRequest {
    pub request_id: Uuid,
    pub api_key: String,
    pub model: Option<String>,
    /// Public URL of the video to analyze.
    pub media_url: String,
    pub prompt: String,
    pub channel: String,
}

impl MediaAnalysisRequest {
    pub fn new(
        api_key: impl Into<String>,
        media_url: impl Into<String>,
        prompt: impl Into<String>,
        channel: impl Into<String>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4(),
            api_key: api_key.into(),
            model: None,
            media_url: media_url.into(),
            prompt: prompt.into(),
            channel: channel.into(),
        }
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }
}

impl fmt::Debug for MediaAnalysisRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaAnalysisRequest")
            .field("request_id", &self.request_id)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("media_url", &self.media_url)
            .field("channel", &self.channel)
            .finish()
    }
}

/// A vendor HTTP request ready to send. Always a JSON `POST`.
#[derive(Clone, PartialEq)]
pub struct HttpRequestSpec {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl HttpRequestSpec {
    /// The URL without its query string, which may carry a key.
    pub fn loggable_url(&self) -> &str {
        self.url.split('?').next().unwrap_or_default()
    }

    /// First header value named `name`, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

impl fmt::Debug for HttpRequestSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.headers.iter().map(|(k, _)| k.as_str()).collect();
        f.debug_struct("HttpRequestSpec")
            .field("url", &self.loggable_url())
            .field("headers", &names)
            .finish_non_exhaustive()
    }
}
