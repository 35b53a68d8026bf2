use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::trace;

/// Keeps the host process alive during a long call.
///
/// Hosts that reclaim idle workers implement this with whatever cheap no-op
/// call counts as activity for them.
#[async_trait]
pub trait LivenessHook: Send + Sync {
    async fn ping(&self);
}

/// A hook that only logs; for hosts that never reclaim the process.
pub struct NoopLiveness;

#[async_trait]
impl LivenessHook for NoopLiveness {
    async fn ping(&self) {
        trace!("liveness ping");
    }
}

/// Pings a [`LivenessHook`] periodically until dropped.
///
/// The first ping fires one interval after start.
pub struct KeepAliveGuard {
    handle: JoinHandle<()>,
}

impl KeepAliveGuard {
    pub fn start(hook: Arc<dyn LivenessHook>, every: Duration) -> Self {
        let every = every.max(Duration::from_millis(1));
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                hook.ping().await;
            }
        });
        Self { handle }
    }
}

impl Drop for KeepAliveGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
