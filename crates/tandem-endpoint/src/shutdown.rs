use tokio::sync::watch;

/// One-way latch signalling shutdown across tasks.
///
/// Wraps a `tokio::sync::watch` channel. Clone-friendly: handlers, the
/// endpoint pump, and server owners all hold copies. Triggering is
/// idempotent; there is no way back.
#[derive(Debug, Clone)]
pub struct ShutdownToken {
    tx: watch::Sender<bool>,
    rx: watch::Receiver<bool>,
}

impl ShutdownToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx, rx }
    }

    /// Raise the signal. Safe to call any number of times.
    pub fn trigger(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until the signal is raised. Returns immediately if it already
    /// was.
    pub async fn triggered(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        loop {
            if rx.changed().await.is_err() {
                // All senders gone counts as shutdown.
                return;
            }
            if *rx.borrow() {
                return;
            }
        }
    }
}

impl Default for ShutdownToken {
    fn default() -> Self {
        Self::new()
    }
}
