use std::fmt;

use serde::{Deserialize, Serialize};
use ytx_agent::{GenerationRequest, LlmProvider, MediaAnalysisRequest};
use ytx_core::{chat_system_prompt, ChatMessage, PromptTemplate, Role};
use ytx_extract::StructuredKind;

/// Response-channel prefixes, one per feature.
pub mod channels {
    pub const SUMMARY: &str = "SUMMARY";
    pub const HTML: &str = "HTML";
    pub const CARDS: &str = "CARDS";
    pub const MINDMAP: &str = "MINDMAP";
    pub const VOCAB: &str = "VOCAB";
    pub const CHAT: &str = "CHAT";
    pub const ANALYZE: &str = "ANALYZE";
}

const DEFAULT_MEDIA_PROMPT: &str = "Watch this video and write structured notes: a short summary, \
the key takeaways, and sections keyed by [m:ss] start timestamps.";

/// Vendor selection carried by every command. Read-only to the dispatcher.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettings {
    pub provider: LlmProvider,
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish()
    }
}

/// A one-message generation over transcript content.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateArgs {
    /// Rendered transcript (`[m:ss] text` lines).
    pub content: String,
    /// Custom template with a `{transcript}` placeholder; the feature's
    /// built-in template when absent.
    #[serde(default)]
    pub prompt_template: Option<String>,
    pub settings: ProviderSettings,
}

/// A chat turn grounded in the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatArgs {
    pub transcript: String,
    /// Conversation so far, ending with the new question.
    pub messages: Vec<ChatMessage>,
    pub settings: ProviderSettings,
}

/// Whole-video analysis, used when no transcript can be obtained.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeArgs {
    pub media_url: String,
    #[serde(default)]
    pub prompt: Option<String>,
    /// Gemini key; media analysis always runs on Gemini.
    pub api_key: String,
    #[serde(default)]
    pub model: Option<String>,
}

impl fmt::Debug for AnalyzeArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalyzeArgs")
            .field("media_url", &self.media_url)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

/// A user action sent from the UI side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    #[serde(rename = "SUMMARIZE")]
    Summarize(GenerateArgs),
    #[serde(rename = "GENERATE_HTML")]
    GenerateHtml(GenerateArgs),
    #[serde(rename = "GENERATE_CARDS")]
    GenerateCards(GenerateArgs),
    #[serde(rename = "GENERATE_MINDMAP")]
    GenerateMindmap(GenerateArgs),
    #[serde(rename = "GENERATE_VOCAB")]
    GenerateVocab(GenerateArgs),
    #[serde(rename = "CHAT_ASK")]
    ChatAsk(ChatArgs),
    #[serde(rename = "ANALYZE_MEDIA")]
    AnalyzeMedia(AnalyzeArgs),
}

/// Token budgets and history length applied when building requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestLimits {
    pub max_tokens: u32,
    pub chat_max_tokens: u32,
    /// Most recent chat messages kept.
    pub chat_history: usize,
}

impl Default for RequestLimits {
    fn default() -> Self {
        Self {
            max_tokens: 8096,
            chat_max_tokens: 4096,
            chat_history: 40,
        }
    }
}

/// What a command turns into on the dispatch side.
#[derive(Debug)]
pub enum Dispatch {
    Generation(GenerationRequest),
    Media(MediaAnalysisRequest),
}

impl Command {
    /// Response-channel prefix for this command's events.
    pub fn channel(&self) -> &'static str {
        match self {
            Command::Summarize(_) => channels::SUMMARY,
            Command::GenerateHtml(_) => channels::HTML,
            Command::GenerateCards(_) => channels::CARDS,
            Command::GenerateMindmap(_) => channels::MINDMAP,
            Command::GenerateVocab(_) => channels::VOCAB,
            Command::ChatAsk(_) => channels::CHAT,
            Command::AnalyzeMedia(_) => channels::ANALYZE,
        }
    }

    /// The structured payload expected back, for JSON features.
    pub fn structured_kind(&self) -> Option<StructuredKind> {
        match self {
            Command::GenerateCards(_) => Some(StructuredKind::Cards),
            Command::GenerateMindmap(_) => Some(StructuredKind::Mindmap),
            Command::GenerateVocab(_) => Some(StructuredKind::Vocab),
            _ => None,
        }
    }

    fn builtin_template(&self) -> PromptTemplate {
        match self {
            Command::GenerateHtml(_) => PromptTemplate::html(),
            Command::GenerateCards(_) => PromptTemplate::cards(),
            Command::GenerateMindmap(_) => PromptTemplate::mindmap(),
            Command::GenerateVocab(_) => PromptTemplate::vocab(),
            _ => PromptTemplate::summary(),
        }
    }

    /// Builds the dispatcher request.
    pub fn into_dispatch(self, limits: &RequestLimits) -> Dispatch {
        let channel = self.channel();
        let template = self.builtin_template();
        match self {
            Command::Summarize(args)
            | Command::GenerateHtml(args)
            | Command::GenerateCards(args)
            | Command::GenerateMindmap(args)
            | Command::GenerateVocab(args) => {
                let template = args
                    .prompt_template
                    .filter(|t| !t.trim().is_empty())
                    .map_or(template, PromptTemplate::new);
                let prompt = template.render(&args.content);
                Dispatch::Generation(
                    GenerationRequest::new(args.settings.provider, args.settings.api_key, channel)
                        .with_model(args.settings.model)
                        .with_messages(vec![ChatMessage::user(prompt)])
                        .with_max_tokens(limits.max_tokens),
                )
            }
            Command::ChatAsk(args) => {
                let skip = args.messages.len().saturating_sub(limits.chat_history);
                // Vendors reject a conversation that opens with an assistant turn.
                let history: Vec<ChatMessage> = args
                    .messages
                    .into_iter()
                    .skip(skip)
                    .skip_while(|m| m.role != Role::User)
                    .collect();
                Dispatch::Generation(
                    GenerationRequest::new(args.settings.provider, args.settings.api_key, channel)
                        .with_model(args.settings.model)
                        .with_system_prompt(chat_system_prompt(&args.transcript))
                        .with_messages(history)
                        .with_max_tokens(limits.chat_max_tokens),
                )
            }
            Command::AnalyzeMedia(args) => {
                let prompt = args
                    .prompt
                    .filter(|p| !p.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_MEDIA_PROMPT.to_string());
                Dispatch::Media(
                    MediaAnalysisRequest::new(args.api_key, args.media_url, prompt, channel)
                        .with_model(args.model),
                )
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn settings(provider: LlmProvider) -> ProviderSettings {
        ProviderSettings {
            provider,
            api_key: "key".into(),
            model: None,
        }
    }

    fn generation(dispatch: Dispatch) -> GenerationRequest {
        match dispatch {
            Dispatch::Generation(req) => req,
            Dispatch::Media(_) => panic!("Expected Generation"),
        }
    }

    #[test]
    fn test_wire_names() {
        let raw = r#"{"type":"GENERATE_CARDS","content":"[0:01] hi","settings":{"provider":"claude","apiKey":"k"}}"#;
        let cmd: Command = serde_json::from_str(raw).unwrap();
        assert!(matches!(cmd, Command::GenerateCards(_)));
        assert_eq!(cmd.channel(), "CARDS");
        assert_eq!(cmd.structured_kind(), Some(StructuredKind::Cards));

        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "GENERATE_CARDS");
    }

    #[test]
    fn test_summarize_renders_custom_template() {
        let cmd = Command::Summarize(GenerateArgs {
            content: "[0:01] hello".into(),
            prompt_template: Some("Sum up: {transcript}".into()),
            settings: settings(LlmProvider::Gemini),
        });
        let req = generation(cmd.into_dispatch(&RequestLimits::default()));
        assert_eq!(req.channel, "SUMMARY");
        assert_eq!(req.max_tokens, 8096);
        assert_eq!(req.messages, vec![ChatMessage::user("Sum up: [0:01] hello")]);
        assert!(req.system_prompt.is_none());
    }

    #[test]
    fn test_builtin_template_when_prompt_missing() {
        let cmd = Command::GenerateVocab(GenerateArgs {
            content: "[0:05] serendipity".into(),
            prompt_template: None,
            settings: settings(LlmProvider::OpenAi),
        });
        let req = generation(cmd.into_dispatch(&RequestLimits::default()));
        assert!(req.messages[0].content.contains("[0:05] serendipity"));
        assert!(!req.messages[0].content.contains("{transcript}"));
    }

    #[test]
    fn test_chat_keeps_recent_history() {
        let messages: Vec<ChatMessage> = (0..45)
            .map(|i| {
                if i % 2 == 0 {
                    ChatMessage::user(format!("q{i}"))
                } else {
                    ChatMessage::assistant(format!("a{i}"))
                }
            })
            .collect();
        let cmd = Command::ChatAsk(ChatArgs {
            transcript: "[0:00] intro".into(),
            messages,
            settings: settings(LlmProvider::Claude),
        });
        let req = generation(cmd.into_dispatch(&RequestLimits::default()));
        // The window starts at a5; the trim moves on to the next user turn.
        assert_eq!(req.messages.len(), 39);
        assert_eq!(req.messages[0].content, "q6");
        assert_eq!(req.messages[0].role, Role::User);
        assert_eq!(req.messages[38].content, "q44");
        assert_eq!(req.messages[38].role, Role::User);
        assert_eq!(req.max_tokens, 4096);
        assert!(req.system_prompt.unwrap().contains("[0:00] intro"));
    }

    #[test]
    fn test_analyze_media_defaults_prompt() {
        let raw = r#"{"type":"ANALYZE_MEDIA","mediaUrl":"https://v","apiKey":"g"}"#;
        let cmd: Command = serde_json::from_str(raw).unwrap();
        match cmd.into_dispatch(&RequestLimits::default()) {
            Dispatch::Media(req) => {
                assert_eq!(req.channel, "ANALYZE");
                assert_eq!(req.prompt, DEFAULT_MEDIA_PROMPT);
            }
            Dispatch::Generation(_) => panic!("Expected Media"),
        }
    }

    #[test]
    fn test_settings_debug_hides_key() {
        let s = ProviderSettings {
            provider: LlmProvider::Claude,
            api_key: "sk-ant-secret".into(),
            model: None,
        };
        assert!(!format!("{s:?}").contains("secret"));
    }
}
