//! Error type for `alertgram-store-sqlite`.

use alertgram_core::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("chat not found: {0}")]
  ChatNotFound(i64),
}

impl StoreError for Error {
  fn is_not_found(&self) -> bool { matches!(self, Self::ChatNotFound(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
