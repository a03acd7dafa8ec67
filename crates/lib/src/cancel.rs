//! Cancellation of a resolution run.

use std::sync::Arc;

use tokio::sync::watch;

/// Signal shared between the caller and a running resolution.
///
/// Clones observe the same signal. Once cancelled, a token stays cancelled.
#[derive(Debug, Clone)]
pub struct CancellationToken {
  tx: Arc<watch::Sender<bool>>,
}

impl Default for CancellationToken {
  fn default() -> Self {
    Self::new()
  }
}

impl CancellationToken {
  pub fn new() -> Self {
    let (tx, _) = watch::channel(false);
    Self { tx: Arc::new(tx) }
  }

  /// Raise the signal.
  pub fn cancel(&self) {
    self.tx.send_replace(true);
  }

  pub fn is_cancelled(&self) -> bool {
    *self.tx.borrow()
  }

  /// Wait until the signal is raised.
  pub async fn cancelled(&self) {
    let mut rx = self.tx.subscribe();
    // The sender lives as long as `self`, so the channel cannot close here.
    let _ = rx.wait_for(|cancelled| *cancelled).await;
  }
}
