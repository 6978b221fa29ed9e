//! Error types for `alertgram-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Command text did not match any known grammar.
  #[error("no matches were found in {0:?}")]
  NoMatch(String),

  /// A configured environment or project that the command grammar could
  /// never address.
  #[error("invalid tag {0:?}: tags must be non-empty word characters")]
  InvalidTag(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
