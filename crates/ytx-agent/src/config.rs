use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The three supported LLM vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Anthropic Messages API.
    Claude,
    /// OpenAI Chat Completions API.
    OpenAi,
    /// Google Gemini `generateContent` API.
    Gemini,
}

impl LlmProvider {
    /// All providers, in display order.
    pub const ALL: [LlmProvider; 3] = [LlmProvider::Claude, LlmProvider::OpenAi, LlmProvider::Gemini];

    /// Lowercase id used in config files and `MODEL` notifications.
    pub fn as_str(self) -> &'static str {
        match self {
            LlmProvider::Claude => "claude",
            LlmProvider::OpenAi => "openai",
            LlmProvider::Gemini => "gemini",
        }
    }

    /// Model used when the caller supplies none, or a foreign one.
    pub fn default_model(self) -> &'static str {
        match self {
            LlmProvider::Claude => "claude-sonnet-4-6",
            LlmProvider::OpenAi => "gpt-4o-mini",
            LlmProvider::Gemini => "gemini-2.5-flash",
        }
    }

    /// Prefix every model id of this vendor starts with.
    pub fn model_prefix(self) -> &'static str {
        match self {
            LlmProvider::Claude => "claude-",
            LlmProvider::OpenAi => "gpt-",
            LlmProvider::Gemini => "gemini-",
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            LlmProvider::Claude => "https://api.anthropic.com",
            LlmProvider::OpenAi => "https://api.openai.com",
            LlmProvider::Gemini => "https://generativelanguage.googleapis.com",
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "claude" | "anthropic" => Ok(LlmProvider::Claude),
            "openai" => Ok(LlmProvider::OpenAi),
            "gemini" | "google" => Ok(LlmProvider::Gemini),
            other => Err(format!("unknown provider '{other}' (expected claude, openai, or gemini)")),
        }
    }
}

/// Picks the model to send to `provider`.
///
/// A requested model that is empty or lacks the vendor's prefix is
/// discarded; this drops stale selections left over from another vendor.
pub fn resolve_model(provider: LlmProvider, requested: Option<&str>) -> String {
    match requested.map(str::trim) {
        Some(m) if !m.is_empty() && m.starts_with(provider.model_prefix()) => m.to_string(),
        _ => provider.default_model().to_string(),
    }
}

/// Runtime knobs for the [`RequestDispatcher`](crate::RequestDispatcher).
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Per-provider endpoint overrides (proxies, mock servers).
    pub base_urls: HashMap<LlmProvider, String>,
    /// Upper bound on one request, connect through last byte. `None` waits
    /// indefinitely.
    pub request_timeout: Option<Duration>,
    /// Period of the liveness ping during one-shot media analysis.
    pub keepalive_interval: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            base_urls: HashMap::new(),
            request_timeout: None,
            keepalive_interval: Duration::from_secs(20),
        }
    }
}

impl DispatcherConfig {
    /// Endpoint root for `provider`, without a trailing slash.
    pub fn base_url(&self, provider: LlmProvider) -> &str {
        self.base_urls
            .get(&provider)
            .map(|u| u.trim_end_matches('/'))
            .unwrap_or_else(|| provider.default_base_url())
    }

    pub fn with_base_url(mut self, provider: LlmProvider, url: impl Into<String>) -> Self {
        self.base_urls.insert(provider, url.into());
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }
}
