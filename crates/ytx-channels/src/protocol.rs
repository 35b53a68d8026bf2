use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use ytx_agent::{DispatchEvent, StreamEvent};
use ytx_core::YtxResult;

#[allow(clippy::expect_used)]
static MESSAGE_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)_(CHUNK|DONE|ERROR|MODEL)$").expect("message type pattern is valid")
});

/// The event half of a `{PREFIX}_{KIND}` message type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Chunk,
    Done,
    Error,
    /// Informational: the resolved provider and model.
    Model,
}

impl MessageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Chunk => "CHUNK",
            MessageKind::Done => "DONE",
            MessageKind::Error => "ERROR",
            MessageKind::Model => "MODEL",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "CHUNK" => Some(MessageKind::Chunk),
            "DONE" => Some(MessageKind::Done),
            "ERROR" => Some(MessageKind::Error),
            "MODEL" => Some(MessageKind::Model),
            _ => None,
        }
    }
}

/// Splits `CARDS_CHUNK` into `("CARDS", Chunk)`.
///
/// The prefix is the shortest match, so `GENERATE_CARDS_DONE` yields
/// `GENERATE_CARDS`.
pub fn parse_type(message_type: &str) -> Option<(&str, MessageKind)> {
    let caps = MESSAGE_TYPE.captures(message_type)?;
    let prefix = caps.get(1)?.as_str();
    let kind = MessageKind::parse(caps.get(2)?.as_str())?;
    Some((prefix, kind))
}

/// One serialized event from the dispatch side to the UI side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl OutboundMessage {
    fn bare(channel: &str, kind: MessageKind) -> Self {
        Self {
            msg_type: format!("{channel}_{}", kind.as_str()),
            text: None,
            error: None,
            provider: None,
            model: None,
        }
    }

    /// Tags a dispatcher event with its response channel.
    pub fn from_event(channel: &str, event: &DispatchEvent) -> Self {
        match event {
            DispatchEvent::Model { provider, model } => Self {
                provider: Some(provider.as_str().to_string()),
                model: Some(model.clone()),
                ..Self::bare(channel, MessageKind::Model)
            },
            DispatchEvent::Stream(StreamEvent::Chunk { text }) => Self {
                text: Some(text.clone()),
                ..Self::bare(channel, MessageKind::Chunk)
            },
            DispatchEvent::Stream(StreamEvent::Done) => Self::bare(channel, MessageKind::Done),
            DispatchEvent::Stream(StreamEvent::Error { message }) => Self {
                error: Some(message.clone()),
                ..Self::bare(channel, MessageKind::Error)
            },
        }
    }

    pub fn to_json(&self) -> YtxResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(raw: &str) -> YtxResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The prefix and the UI-side event, or `None` for a type outside the
    /// `{PREFIX}_{KIND}` scheme.
    pub fn decode(self) -> Option<(String, PanelEvent)> {
        let (prefix, kind) = parse_type(&self.msg_type)?;
        let prefix = prefix.to_string();
        let event = match kind {
            MessageKind::Chunk => PanelEvent::Chunk(self.text.unwrap_or_default()),
            MessageKind::Done => PanelEvent::Done,
            MessageKind::Error => PanelEvent::Error(self.error.unwrap_or_default()),
            MessageKind::Model => PanelEvent::Model {
                provider: self.provider.unwrap_or_default(),
                model: self.model.unwrap_or_default(),
            },
        };
        Some((prefix, event))
    }
}

/// An event as the UI side sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelEvent {
    Chunk(String),
    Done,
    Error(String),
    Model { provider: String, model: String },
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use ytx_agent::LlmProvider;

    #[test]
    fn test_parse_type() {
        assert_eq!(parse_type("SUMMARY_CHUNK"), Some(("SUMMARY", MessageKind::Chunk)));
        assert_eq!(
            parse_type("GENERATE_CARDS_DONE"),
            Some(("GENERATE_CARDS", MessageKind::Done))
        );
        assert_eq!(parse_type("CHAT_MODEL"), Some(("CHAT", MessageKind::Model)));
        assert_eq!(parse_type("SUMMARIZE"), None);
        assert_eq!(parse_type("_DONE"), None);
    }

    #[test]
    fn test_wire_shapes() {
        let chunk = OutboundMessage::from_event("CARDS", &StreamEvent::chunk("x").into());
        assert_eq!(chunk.to_json().unwrap(), r#"{"type":"CARDS_CHUNK","text":"x"}"#);

        let done = OutboundMessage::from_event("CARDS", &StreamEvent::Done.into());
        assert_eq!(done.to_json().unwrap(), r#"{"type":"CARDS_DONE"}"#);

        let err = OutboundMessage::from_event("CHAT", &StreamEvent::error("boom").into());
        assert_eq!(err.to_json().unwrap(), r#"{"type":"CHAT_ERROR","error":"boom"}"#);

        let model = OutboundMessage::from_event(
            "SUMMARY",
            &DispatchEvent::Model {
                provider: LlmProvider::OpenAi,
                model: "gpt-4o-mini".into(),
            },
        );
        assert_eq!(
            model.to_json().unwrap(),
            r#"{"type":"SUMMARY_MODEL","provider":"openai","model":"gpt-4o-mini"}"#
        );
    }

    #[test]
    fn test_decode() {
        let msg = OutboundMessage::from_json(r#"{"type":"VOCAB_CHUNK","text":"hi"}"#).unwrap();
        assert_eq!(
            msg.decode(),
            Some(("VOCAB".to_string(), PanelEvent::Chunk("hi".into())))
        );

        let msg = OutboundMessage::from_json(r#"{"type":"PING"}"#).unwrap();
        assert_eq!(msg.decode(), None);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(OutboundMessage::from_json("not json").is_err());
    }
}
