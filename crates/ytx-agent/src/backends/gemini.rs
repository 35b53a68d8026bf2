use serde_json::{json, Value};
use ytx_core::Role;

use super::ProviderAdapter;
use crate::config::LlmProvider;
use crate::request::{GenerationRequest, HttpRequestSpec, MediaAnalysisRequest};

/// Completion budget for the one-shot media analysis call.
const MEDIA_MAX_OUTPUT_TOKENS: u32 = 8192;

/// Google Gemini API.
///
/// The model id and API key live in the URL; streaming is selected by the
/// `streamGenerateContent` method with `alt=sse`. Gemini has no in-payload
/// stop event, so completion comes from the stream closing.
pub struct GeminiAdapter {
    base_url: String,
}

impl GeminiAdapter {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    fn model_url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/v1beta/models/{model}:{method}",
            self.base_url.trim_end_matches('/')
        )
    }

    /// Non-streaming request that hands Gemini a video URL to watch.
    pub fn build_media_request(&self, req: &MediaAnalysisRequest, model: &str) -> HttpRequestSpec {
        HttpRequestSpec {
            url: with_query(self.model_url(model, "generateContent"), &[("key", req.api_key.as_str())]),
            headers: vec![("content-type".into(), "application/json".into())],
            body: json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        {"file_data": {"file_uri": req.media_url}},
                        {"text": req.prompt},
                    ],
                }],
                "generationConfig": {"maxOutputTokens": MEDIA_MAX_OUTPUT_TOKENS},
            }),
        }
    }

    /// All text parts of the first candidate of a `generateContent` reply.
    pub fn extract_full_text(response: &Value) -> Option<String> {
        let parts = response["candidates"][0]["content"]["parts"].as_array()?;
        let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

/// Appends form-encoded query pairs. An unparseable base is returned
/// without them, so the key never travels in a malformed URL.
fn with_query(url: String, pairs: &[(&str, &str)]) -> String {
    match reqwest::Url::parse(&url) {
        Ok(mut parsed) => {
            parsed.query_pairs_mut().extend_pairs(pairs);
            parsed.into()
        }
        Err(_) => url,
    }
}

impl ProviderAdapter for GeminiAdapter {
    fn provider(&self) -> LlmProvider {
        LlmProvider::Gemini
    }

    fn build_request(&self, req: &GenerationRequest, model: &str) -> HttpRequestSpec {
        let contents: Vec<Value> = req
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {"maxOutputTokens": req.max_tokens},
        });

        if let Some(sys) = req.system() {
            body["systemInstruction"] = json!({"parts": [{"text": sys}]});
        }

        HttpRequestSpec {
            url: with_query(
                self.model_url(model, "streamGenerateContent"),
                &[("alt", "sse"), ("key", req.api_key.as_str())],
            ),
            headers: vec![("content-type".into(), "application/json".into())],
            body,
        }
    }

    fn extract_delta_text(&self, event: &Value) -> Option<String> {
        event["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(ToString::to_string)
    }

    fn is_stream_end(&self, _event: &Value) -> bool {
        false
    }
}
