use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use ytx_extract::{parse_structured, StructuredKind, StructuredPayload};

use crate::command::Command;
use crate::protocol::PanelEvent;

/// How a request ended, as the UI renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelOutcome {
    /// Still streaming.
    Pending,
    /// Prose features: the accumulated text.
    Text(String),
    /// JSON features: the recovered payload.
    Structured(StructuredPayload),
    /// The request or the extraction failed; the message is user-facing.
    Failed(String),
}

/// UI-side state of one generation request.
///
/// Created when the request starts, fed every event for its channel, and
/// finalized by the first `Done` or `Error`. Later events are ignored.
#[derive(Debug, Clone)]
pub struct PanelRequestContext {
    channel: String,
    kind: Option<StructuredKind>,
    raw_text: String,
    generating: bool,
    model: Option<(String, String)>,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    outcome: PanelOutcome,
}

impl PanelRequestContext {
    pub fn new(channel: impl Into<String>, kind: Option<StructuredKind>) -> Self {
        Self {
            channel: channel.into(),
            kind,
            raw_text: String::new(),
            generating: true,
            model: None,
            started_at: Utc::now(),
            finished_at: None,
            outcome: PanelOutcome::Pending,
        }
    }

    /// A context for the request `command` is about to start.
    pub fn for_command(command: &Command) -> Self {
        Self::new(command.channel(), command.structured_kind())
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn outcome(&self) -> &PanelOutcome {
        &self.outcome
    }

    /// `(provider, model)` from the last `MODEL` notification.
    pub fn model(&self) -> Option<(&str, &str)> {
        self.model.as_ref().map(|(p, m)| (p.as_str(), m.as_str()))
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Wall time from start to finalization.
    pub fn elapsed(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }

    /// Applies one event. Returns `false` when it was ignored because the
    /// request had already finished.
    pub fn apply(&mut self, event: PanelEvent) -> bool {
        if !self.generating {
            debug!(channel = %self.channel, "ignoring event after finalization");
            return false;
        }
        match event {
            PanelEvent::Chunk(text) => self.raw_text.push_str(&text),
            PanelEvent::Model { provider, model } => self.model = Some((provider, model)),
            PanelEvent::Done => self.finish(self.finalize_text()),
            PanelEvent::Error(message) => self.finish(PanelOutcome::Failed(message)),
        }
        true
    }

    fn finalize_text(&self) -> PanelOutcome {
        let Some(kind) = self.kind else {
            return PanelOutcome::Text(self.raw_text.clone());
        };
        match parse_structured(kind, &self.raw_text) {
            Ok(payload) => PanelOutcome::Structured(payload),
            Err(e) => {
                warn!(channel = %self.channel, error = %e, "structured output could not be recovered");
                PanelOutcome::Failed(format!(
                    "The {} output could not be read; please regenerate ({e})",
                    kind_label(kind)
                ))
            }
        }
    }

    fn finish(&mut self, outcome: PanelOutcome) {
        self.generating = false;
        self.finished_at = Some(Utc::now());
        self.outcome = outcome;
    }
}

fn kind_label(kind: StructuredKind) -> &'static str {
    match kind {
        StructuredKind::Cards => "flashcard",
        StructuredKind::Mindmap => "mind map",
        StructuredKind::Vocab => "vocabulary",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_prose_accumulates_and_finishes() {
        let mut ctx = PanelRequestContext::new("SUMMARY", None);
        assert!(ctx.is_generating());
        ctx.apply(PanelEvent::Chunk("Hel".into()));
        ctx.apply(PanelEvent::Chunk("lo".into()));
        ctx.apply(PanelEvent::Done);

        assert!(!ctx.is_generating());
        assert_eq!(ctx.outcome(), &PanelOutcome::Text("Hello".into()));
        assert!(ctx.elapsed().is_some());
    }

    #[test]
    fn test_structured_parse_on_done() {
        let mut ctx = PanelRequestContext::new("CARDS", Some(StructuredKind::Cards));
        ctx.apply(PanelEvent::Chunk("```json\n[{\"front\":\"Q\",".into()));
        ctx.apply(PanelEvent::Chunk("\"back\":\"A\"}]\n```".into()));
        ctx.apply(PanelEvent::Done);
        match ctx.outcome() {
            PanelOutcome::Structured(StructuredPayload::Cards(cards)) => {
                assert_eq!(cards[0].front, "Q");
            }
            other => panic!("Expected Cards, got {other:?}"),
        }
    }

    #[test]
    fn test_unrecoverable_structured_output_asks_to_regenerate() {
        let mut ctx = PanelRequestContext::new("MINDMAP", Some(StructuredKind::Mindmap));
        ctx.apply(PanelEvent::Chunk("I cannot make a mind map of this.".into()));
        ctx.apply(PanelEvent::Done);
        match ctx.outcome() {
            PanelOutcome::Failed(msg) => assert!(msg.contains("regenerate")),
            other => panic!("Expected Failed, got {other:?}"),
        }
    }

    #[test]
    fn test_events_after_terminal_are_ignored() {
        let mut ctx = PanelRequestContext::new("CHAT", None);
        ctx.apply(PanelEvent::Error("quota".into()));
        assert!(!ctx.apply(PanelEvent::Chunk("late".into())));
        assert!(!ctx.apply(PanelEvent::Done));
        assert_eq!(ctx.outcome(), &PanelOutcome::Failed("quota".into()));
        assert_eq!(ctx.raw_text(), "");
    }

    #[test]
    fn test_model_recorded() {
        let mut ctx = PanelRequestContext::new("HTML", None);
        ctx.apply(PanelEvent::Model {
            provider: "gemini".into(),
            model: "gemini-2.5-flash".into(),
        });
        assert_eq!(ctx.model(), Some(("gemini", "gemini-2.5-flash")));
        assert_eq!(ctx.outcome(), &PanelOutcome::Pending);
    }
}
