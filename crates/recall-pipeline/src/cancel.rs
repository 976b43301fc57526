use std::sync::Arc;

use tokio::sync::watch;

/// Cooperative cancellation shared by every image worker of a run.
///
/// Workers check it between stages; a stage already running completes.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelSignal {
    fn default() -> Self { Self::new() }
}

impl CancelSignal {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self { tx: Arc::new(tx), rx }
    }

    pub fn cancel(&self) { self.tx.send_replace(true); }

    pub fn is_cancelled(&self) -> bool { *self.rx.borrow() }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|c| *c).await;
    }
}
