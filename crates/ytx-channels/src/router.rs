use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace};

use crate::panel::PanelRequestContext;
use crate::protocol::{OutboundMessage, PanelEvent};

/// Receives the events routed to one channel prefix.
pub trait PanelConsumer: Send + Sync {
    fn on_event(&self, event: PanelEvent);
}

impl PanelConsumer for Mutex<PanelRequestContext> {
    fn on_event(&self, event: PanelEvent) {
        self.lock().apply(event);
    }
}

/// What became of one routed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Handed to the consumer registered for its prefix.
    Delivered,
    /// No consumer for this prefix; dropped.
    Unrouted,
    /// Not JSON, or a type outside the `{PREFIX}_{KIND}` scheme; dropped.
    Malformed,
}

/// Dispatches UI-side messages to exactly one consumer per prefix.
///
/// Messages for a prefix nobody listens to are a no-op: the request that
/// produced them has been abandoned.
#[derive(Default)]
pub struct PanelRouter {
    consumers: RwLock<HashMap<String, Arc<dyn PanelConsumer>>>,
    last_model: RwLock<Option<(String, String)>>,
}

impl PanelRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `consumer` for `prefix`, replacing any previous one.
    pub fn register(&self, prefix: impl Into<String>, consumer: Arc<dyn PanelConsumer>) {
        self.consumers.write().insert(prefix.into(), consumer);
    }

    pub fn unregister(&self, prefix: &str) -> bool {
        self.consumers.write().remove(prefix).is_some()
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.read().len()
    }

    /// `(provider, model)` from the most recent `MODEL` message on any
    /// channel.
    pub fn last_model(&self) -> Option<(String, String)> {
        self.last_model.read().clone()
    }

    /// Routes one serialized message.
    pub fn route_json(&self, raw: &str) -> RouteOutcome {
        match OutboundMessage::from_json(raw) {
            Ok(message) => self.route(message),
            Err(e) => {
                debug!(error = %e, "dropping unparseable message");
                RouteOutcome::Malformed
            }
        }
    }

    pub fn route(&self, message: OutboundMessage) -> RouteOutcome {
        let Some((prefix, event)) = message.decode() else {
            return RouteOutcome::Malformed;
        };

        if let PanelEvent::Model { provider, model } = &event {
            *self.last_model.write() = Some((provider.clone(), model.clone()));
        }

        // Clone out of the lock so the consumer runs without holding it.
        let consumer = self.consumers.read().get(&prefix).cloned();
        match consumer {
            Some(consumer) => {
                consumer.on_event(event);
                RouteOutcome::Delivered
            }
            None => {
                trace!(prefix = %prefix, "no consumer registered");
                RouteOutcome::Unrouted
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::panel::PanelOutcome;

    struct Recorder(Mutex<Vec<PanelEvent>>);

    impl PanelConsumer for Recorder {
        fn on_event(&self, event: PanelEvent) {
            self.0.lock().push(event);
        }
    }

    #[test]
    fn test_routes_by_prefix() {
        let router = PanelRouter::new();
        let summary = Arc::new(Recorder(Mutex::new(Vec::new())));
        let cards = Arc::new(Recorder(Mutex::new(Vec::new())));
        router.register("SUMMARY", summary.clone());
        router.register("CARDS", cards.clone());

        assert_eq!(
            router.route_json(r#"{"type":"SUMMARY_CHUNK","text":"s"}"#),
            RouteOutcome::Delivered
        );
        assert_eq!(
            router.route_json(r#"{"type":"CARDS_CHUNK","text":"c"}"#),
            RouteOutcome::Delivered
        );
        assert_eq!(summary.0.lock().as_slice(), &[PanelEvent::Chunk("s".into())]);
        assert_eq!(cards.0.lock().as_slice(), &[PanelEvent::Chunk("c".into())]);
    }

    #[test]
    fn test_unknown_prefix_is_noop() {
        let router = PanelRouter::new();
        assert_eq!(
            router.route_json(r#"{"type":"VOCAB_DONE"}"#),
            RouteOutcome::Unrouted
        );
        assert_eq!(router.route_json("{"), RouteOutcome::Malformed);
        assert_eq!(router.route_json(r#"{"type":"HELLO"}"#), RouteOutcome::Malformed);
    }

    #[test]
    fn test_remembers_last_model() {
        let router = PanelRouter::new();
        router.route_json(r#"{"type":"CHAT_MODEL","provider":"openai","model":"gpt-4o"}"#);
        assert_eq!(
            router.last_model(),
            Some(("openai".to_string(), "gpt-4o".to_string()))
        );
    }

    #[test]
    fn test_context_consumer() {
        let router = PanelRouter::new();
        let ctx = Arc::new(Mutex::new(PanelRequestContext::new("HTML", None)));
        router.register("HTML", ctx.clone());

        router.route_json(r#"{"type":"HTML_CHUNK","text":"<p>"}"#);
        router.route_json(r#"{"type":"HTML_DONE"}"#);
        assert!(router.unregister("HTML"));
        assert_eq!(router.consumer_count(), 0);

        assert_eq!(ctx.lock().outcome(), &PanelOutcome::Text("<p>".into()));
    }
}
