//! Cancellable delay scheduling for the timed reveal sequence.
//!
//! Every pause the orchestrator takes (settle, pre-reveal, typing)
//! runs through one [`RevealScheduler`], so a reset can cancel the
//! whole pending sequence at once and no stale timer fires into a
//! fresh conversation.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Schedules the delays that pace the conversation.
///
/// Each call to [`pause`](Self::pause) races the delay against the
/// current cancellation token; [`cancel_pending`](Self::cancel_pending)
/// trips the token and installs a fresh one so later delays run
/// normally.
#[derive(Debug)]
pub struct RevealScheduler {
    token: Mutex<CancellationToken>,
}

impl Default for RevealScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl RevealScheduler {
    /// Creates a scheduler with no pending delays.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: Mutex::new(CancellationToken::new()),
        }
    }

    /// Waits for `duration`, returning `false` if the wait was
    /// cancelled before it elapsed.
    ///
    /// A zero duration completes immediately but still observes an
    /// already-cancelled token.
    pub async fn pause(&self, duration: Duration) -> bool {
        let token = self.token.lock().await.clone();
        if token.is_cancelled() {
            return false;
        }
        tokio::select! {
            () = token.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }

    /// Cancels every pending delay and arms a fresh token for
    /// subsequent ones.
    pub async fn cancel_pending(&self) {
        let mut token = self.token.lock().await;
        token.cancel();
        *token = CancellationToken::new();
    }
}
