//! Cooperative run cancellation.

use std::sync::Arc;
use tokio::sync::watch;

/// A cloneable flag for cancelling a run in flight.
///
/// The orchestrator polls the token between iterations and between tool
/// dispatches, and races [`cancelled`](Self::cancelled) against in-flight
/// round trips so a cancel lands mid-stream too. Cancelling is idempotent
/// and affects every clone of the token.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    flag: Arc<watch::Sender<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            flag: Arc::new(sender),
        }
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.send_replace(true);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        *self.flag.borrow()
    }

    /// Resolves once cancellation has been requested; immediately when the
    /// token is already cancelled. Meant for `tokio::select!` against work
    /// that should stop on cancel.
    pub async fn cancelled(&self) {
        let mut rx = self.flag.subscribe();
        // The sender lives in self, so the channel cannot close under us.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}
