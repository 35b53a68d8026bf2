use async_trait::async_trait;
use tokio::sync::mpsc;
use ytx_core::{YtxError, YtxResult};

/// Delivers serialized messages to the UI side.
///
/// Delivery is best effort. An `Err` means the receiving context is gone;
/// callers log it and move on.
#[async_trait]
pub trait EventSink: Send + Sync {
    fn name(&self) -> &str;
    async fn deliver(&self, message: String) -> YtxResult<()>;
}

/// A sink backed by an unbounded in-process channel.
pub struct MpscSink {
    name: String,
    tx: mpsc::UnboundedSender<String>,
}

impl MpscSink {
    pub fn new(name: impl Into<String>, tx: mpsc::UnboundedSender<String>) -> Self {
        Self {
            name: name.into(),
            tx,
        }
    }

    /// A sink and the receiver its messages arrive on.
    pub fn channel(name: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(name, tx), rx)
    }
}

#[async_trait]
impl EventSink for MpscSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, message: String) -> YtxResult<()> {
        self.tx
            .send(message)
            .map_err(|_| YtxError::Channel(format!("receiver for '{}' is gone", self.name)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_deliver() {
        let (sink, mut rx) = MpscSink::channel("panel");
        sink.deliver("hello".into()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap(), "hello");
        assert_eq!(sink.name(), "panel");
    }

    #[tokio::test]
    async fn test_deliver_after_receiver_dropped() {
        let (sink, rx) = MpscSink::channel("panel");
        drop(rx);
        let err = sink.deliver("late".into()).await.unwrap_err();
        assert!(matches!(err, YtxError::Channel(_)));
    }
}
