use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use ytx_agent::{DispatchEvent, RequestDispatcher};
use ytx_core::YtxResult;

use crate::command::{Command, Dispatch, RequestLimits};
use crate::protocol::OutboundMessage;
use crate::sink::EventSink;

/// Runs inbound commands and relays their events to the UI side.
///
/// Several commands may be in flight at once; each relays under its own
/// channel prefix, so their events never mix.
pub struct MessageBridge {
    dispatcher: RequestDispatcher,
    sink: Arc<dyn EventSink>,
    limits: RequestLimits,
}

impl MessageBridge {
    pub fn new(dispatcher: RequestDispatcher, sink: Arc<dyn EventSink>) -> Self {
        Self {
            dispatcher,
            sink,
            limits: RequestLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: RequestLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Parses a serialized command and submits it.
    pub fn submit_json(&self, raw: &str) -> YtxResult<JoinHandle<()>> {
        let command: Command = serde_json::from_str(raw)?;
        Ok(self.submit(command))
    }

    /// Starts `command`. The handle resolves once its terminal event has
    /// been relayed.
    pub fn submit(&self, command: Command) -> JoinHandle<()> {
        let channel = command.channel();
        info!(channel, "command received");

        let (rx, dispatch) = match command.into_dispatch(&self.limits) {
            Dispatch::Generation(req) => self.dispatcher.spawn(req),
            Dispatch::Media(req) => self.dispatcher.spawn_media(req),
        };

        let sink = Arc::clone(&self.sink);
        tokio::spawn(async move {
            let relayed = relay(channel, rx, sink.as_ref()).await;
            if let Err(e) = dispatch.await {
                warn!(channel, error = %e, "dispatch task failed");
            }
            debug!(channel, relayed, "relay finished");
        })
    }
}

/// Forwards every event on `rx` to `sink`, tagged with `channel`.
///
/// Stops at the first failed delivery and drops `rx`, which tells the
/// dispatcher its consumer is gone. Returns how many messages were delivered.
pub async fn relay(channel: &str, mut rx: mpsc::Receiver<DispatchEvent>, sink: &dyn EventSink) -> usize {
    let mut delivered = 0;
    while let Some(event) = rx.recv().await {
        let json = match OutboundMessage::from_event(channel, &event).to_json() {
            Ok(json) => json,
            Err(e) => {
                warn!(channel, error = %e, "could not serialize event");
                continue;
            }
        };
        match sink.deliver(json).await {
            Ok(()) => delivered += 1,
            Err(e) => {
                debug!(channel, sink = sink.name(), error = %e, "consumer gone; abandoning relay");
                break;
            }
        }
    }
    delivered
}
