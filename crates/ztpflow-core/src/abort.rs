//! Run cancellation

use tokio::sync::watch;

/// Raises the abort flag for a run
#[derive(Debug, Clone)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

/// Observes the abort flag; checked between stages
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortHandle {
    /// Create a handle and its first signal
    #[must_use]
    pub fn pair() -> (Self, AbortSignal) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, AbortSignal { rx })
    }

    /// Ask the run to stop before the next stage
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    /// Another signal tied to this handle
    #[must_use]
    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl AbortSignal {
    #[must_use]
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }
}
