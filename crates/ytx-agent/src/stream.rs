use serde::{Deserialize, Serialize};

use crate::config::LlmProvider;

/// Provider-agnostic events of one streaming response.
///
/// Any number of `Chunk`s, then exactly one terminal `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// An incremental text fragment.
    Chunk {
        text: String,
    },

    /// The stream has finished successfully.
    Done,

    /// The request failed; nothing follows.
    Error {
        message: String,
    },
}

impl StreamEvent {
    pub fn chunk(text: impl Into<String>) -> Self {
        StreamEvent::Chunk { text: text.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error {
            message: message.into(),
        }
    }

    /// `true` for `Done` and `Error`.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }
}

/// What the dispatcher reports for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchEvent {
    /// The effective model was resolved. Informational, sent before any
    /// stream event.
    Model {
        provider: LlmProvider,
        model: String,
    },
    Stream(StreamEvent),
}

impl From<StreamEvent> for DispatchEvent {
    fn from(event: StreamEvent) -> Self {
        DispatchEvent::Stream(event)
    }
}
