//! Cancellation and deadline context for blocking operations.
//!
//! Every public operation that touches the filesystem or the metadata store
//! takes an [`OpContext`] and checks it on entry and between units of work. An
//! in-flight file copy is never interrupted midway.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
  #[error("operation cancelled")]
  Cancelled,

  #[error("operation deadline exceeded")]
  DeadlineExceeded,
}

#[derive(Debug, Clone, Default)]
pub struct OpContext {
  cancel: CancellationToken,
  deadline: Option<Instant>,
}

impl OpContext {
  /// A context that is never cancelled and has no deadline.
  pub fn background() -> Self {
    Self::default()
  }

  /// A context cancelled through `token`.
  pub fn with_token(token: CancellationToken) -> Self {
    Self {
      cancel: token,
      deadline: None,
    }
  }

  pub fn with_timeout(mut self, timeout: Duration) -> Self {
    self.deadline = Some(Instant::now() + timeout);
    self
  }

  pub fn with_deadline(mut self, deadline: Instant) -> Self {
    self.deadline = Some(deadline);
    self
  }

  pub fn token(&self) -> &CancellationToken {
    &self.cancel
  }

  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  /// Returns an error if the context is already done.
  pub fn check(&self) -> Result<(), ContextError> {
    if self.cancel.is_cancelled() {
      return Err(ContextError::Cancelled);
    }
    if let Some(deadline) = self.deadline
      && Instant::now() >= deadline
    {
      return Err(ContextError::DeadlineExceeded);
    }
    Ok(())
  }
}
