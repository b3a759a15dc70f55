//! Cancellation
//!
//! A cancel token is the receiving end of a channel nobody ever sends on.
//! Dropping the sender disconnects it, after which every `recv` on the token
//! is immediately ready, so any `select!` that includes it wakes up.

use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError};
use parking_lot::Mutex;

/// Owner side: triggers cancellation for every token it handed out
pub struct CancelHandle {
    trigger: Mutex<Option<Sender<()>>>,
    token: CancelToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (trigger, signal) = bounded(0);
        Self {
            trigger: Mutex::new(Some(trigger)),
            token: CancelToken { signal },
        }
    }

    /// Get a token observing this handle
    pub fn token(&self) -> CancelToken {
        self.token.clone()
    }

    /// Cancel every token. Idempotent.
    pub fn cancel(&self) {
        if self.trigger.lock().take().is_some() {
            tracing::debug!("Cancellation triggered");
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.trigger.lock().is_none()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side, cloned into every worker
#[derive(Debug, Clone)]
pub struct CancelToken {
    signal: Receiver<()>,
}

impl CancelToken {
    /// The receiver to include in a `select!`
    pub fn receiver(&self) -> &Receiver<()> {
        &self.signal
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.signal.try_recv(), Err(TryRecvError::Disconnected))
    }
}
