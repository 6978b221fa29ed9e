//! SQLite backend for the Alertgram chat store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Records live in a single key/value
//! table using the `telegram/chats/<id>` and `telegram/messages` layout.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
