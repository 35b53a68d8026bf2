use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;
use ytx_agent::{DispatcherConfig, LlmProvider};
use ytx_channels::{ProviderSettings, RequestLimits};

/// Contents of `ytx.toml`. Every field is optional.
#[derive(Debug, Deserialize)]
pub struct YtxConfig {
    #[serde(default = "default_provider")]
    pub provider: LlmProvider,
    /// Whole-request limit in seconds; 0 disables it.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_chat_max_tokens")]
    pub chat_max_tokens: u32,
    #[serde(default = "default_chat_history")]
    pub chat_history: usize,
    /// API keys by provider name. `YTX_<PROVIDER>_API_KEY` fills the gaps.
    #[serde(default)]
    pub keys: HashMap<String, String>,
    /// Preferred model by provider name.
    #[serde(default)]
    pub models: HashMap<String, String>,
    /// Endpoint overrides by provider name.
    #[serde(default)]
    pub base_urls: HashMap<String, String>,
}

impl Default for YtxConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            request_timeout_secs: default_request_timeout(),
            keepalive_interval_secs: default_keepalive_interval(),
            max_tokens: default_max_tokens(),
            chat_max_tokens: default_chat_max_tokens(),
            chat_history: default_chat_history(),
            keys: HashMap::new(),
            models: HashMap::new(),
            base_urls: HashMap::new(),
        }
    }
}

fn default_provider() -> LlmProvider {
    LlmProvider::Gemini
}
fn default_request_timeout() -> u64 {
    300
}
fn default_keepalive_interval() -> u64 {
    20
}
fn default_max_tokens() -> u32 {
    8096
}
fn default_chat_max_tokens() -> u32 {
    4096
}
fn default_chat_history() -> usize {
    40
}

impl YtxConfig {
    /// Reads and parses a TOML config file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            anyhow::anyhow!("Failed to read config file '{}': {}", path.display(), e)
        })?;
        Ok(toml::from_str(&raw)?)
    }

    /// Loads `path` when it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        let mut config = DispatcherConfig::default()
            .with_request_timeout(self.request_timeout())
            .with_keepalive_interval(Duration::from_secs(self.keepalive_interval_secs.max(1)));
        for (name, url) in &self.base_urls {
            match name.parse::<LlmProvider>() {
                Ok(provider) => config = config.with_base_url(provider, url.clone()),
                Err(e) => warn!(error = %e, "ignoring base_urls entry"),
            }
        }
        config
    }

    pub fn limits(&self) -> RequestLimits {
        RequestLimits {
            max_tokens: self.max_tokens,
            chat_max_tokens: self.chat_max_tokens,
            chat_history: self.chat_history,
        }
    }

    /// Key for `provider`, from the file or the environment. Empty when
    /// neither has one; the dispatcher reports that to the user.
    pub fn api_key(&self, provider: LlmProvider) -> String {
        self.api_key_with(provider, |name| std::env::var(name).ok())
    }

    fn api_key_with(&self, provider: LlmProvider, env: impl Fn(&str) -> Option<String>) -> String {
        lookup(&self.keys, provider)
            .filter(|k| !k.trim().is_empty())
            .map(str::to_string)
            .or_else(|| env(&format!("YTX_{}_API_KEY", provider.as_str().to_ascii_uppercase())))
            .unwrap_or_default()
    }

    pub fn model(&self, provider: LlmProvider) -> Option<String> {
        lookup(&self.models, provider).map(str::to_string)
    }

    /// Settings for one request. `provider` and `model` override the file.
    pub fn settings(&self, provider: Option<LlmProvider>, model: Option<String>) -> ProviderSettings {
        let provider = provider.unwrap_or(self.provider);
        ProviderSettings {
            provider,
            api_key: self.api_key(provider),
            model: model.or_else(|| self.model(provider)),
        }
    }
}

fn lookup(table: &HashMap<String, String>, provider: LlmProvider) -> Option<&str> {
    table
        .iter()
        .find(|(name, _)| name.parse::<LlmProvider>().ok() == Some(provider))
        .map(|(_, value)| value.as_str())
}
