//! Error taxonomy for the relay.
//!
//! Every failure a command handler can hit maps onto one variant; the
//! `Display` text is what the chat sees as a reply.

use alertgram_core::store::StoreError;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("this chat is not subscribed, send /start first")]
  NotFound,
  #[error("storage error: {0}")]
  Storage(#[source] BoxError),
  #[error("transport error: {0}")]
  Transport(#[source] BoxError),
  #[error("failed to parse command: {0}")]
  Parse(#[from] alertgram_core::Error),
  #[error("dropped message from forbidden sender {sender_id}")]
  Forbidden { sender_id: i64 },
  #[error("alertmanager error: {0}")]
  AlertSource(#[source] BoxError),
  #[error("invalid configuration: {0}")]
  Config(String),
  #[error("failed to render message: {0}")]
  Render(String),
}

impl Error {
  /// Classify a store failure, keeping "not subscribed" apart from a broken
  /// database.
  pub fn store<E: StoreError>(err: E) -> Self {
    if err.is_not_found() {
      Error::NotFound
    } else {
      Error::Storage(Box::new(err))
    }
  }

  pub fn transport<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::Transport(Box::new(err))
  }

  pub fn source<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Error::AlertSource(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
