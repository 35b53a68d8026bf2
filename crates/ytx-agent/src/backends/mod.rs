pub mod claude;
pub mod gemini;
pub mod openai;

use serde_json::Value;

use crate::config::LlmProvider;
use crate::request::{GenerationRequest, HttpRequestSpec};

pub use claude::ClaudeAdapter;
pub use gemini::GeminiAdapter;
pub use openai::OpenAiAdapter;

/// Request and response-shape knowledge for one vendor.
///
/// Adapters are pure: they build requests and read decoded SSE payloads, but
/// never perform I/O. Shape mismatches yield `None`/`false`, never a panic.
///
/// To add a provider:
/// 1. Create a module in `backends/`
/// 2. Implement `ProviderAdapter` for its struct
/// 3. Add the variant to `LlmProvider` in `config.rs`
/// 4. Wire it up in [`adapter_for`]
pub trait ProviderAdapter: Send + Sync {
    fn provider(&self) -> LlmProvider;

    /// Builds the streaming request for `model`, already resolved.
    fn build_request(&self, req: &GenerationRequest, model: &str) -> HttpRequestSpec;

    /// Incremental text carried by one decoded SSE payload.
    fn extract_delta_text(&self, event: &Value) -> Option<String>;

    /// Whether this payload is the vendor's own end-of-stream signal.
    fn is_stream_end(&self, event: &Value) -> bool;

    /// Error reported inside an otherwise successful stream.
    ///
    /// The default reads a top-level `error` object, as OpenAI and Gemini
    /// send it.
    fn extract_stream_error(&self, event: &Value) -> Option<String> {
        error_message(event.get("error")?)
    }
}

/// Message text of a vendor error value (object with `message`, or string).
pub(crate) fn error_message(error: &Value) -> Option<String> {
    match error {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(
            other
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| other.to_string(), ToString::to_string),
        ),
    }
}

/// The adapter for `provider`, talking to `base_url`.
pub fn adapter_for(provider: LlmProvider, base_url: &str) -> Box<dyn ProviderAdapter> {
    match provider {
        LlmProvider::Claude => Box::new(ClaudeAdapter::new(base_url)),
        LlmProvider::OpenAi => Box::new(OpenAiAdapter::new(base_url)),
        LlmProvider::Gemini => Box::new(GeminiAdapter::new(base_url)),
    }
}
