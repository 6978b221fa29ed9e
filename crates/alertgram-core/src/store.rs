//! Persistence boundary for subscriptions and sent messages, implemented by
//! `alertgram-store-sqlite`.

use std::{collections::BTreeSet, future::Future};

use chrono::TimeDelta;

use crate::{
  chat::{ChatMeta, ChatRecord},
  message::MessageRecord,
};

/// Errors a [`ChatStore`] can report.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// Whether the error means the addressed chat is not subscribed.
  fn is_not_found(&self) -> bool;
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Durable storage for subscribed chats and outstanding sent messages.
///
/// The store is shared by the webhook fan-out, the deletion sweep and the
/// command handlers. Each mutation of a single chat is a serialized
/// read-modify-write: two concurrent mutations of the same chat never lose an
/// update. Mutations of different chats are logically independent, but an
/// implementation may still queue them behind one another; the SQLite
/// backend runs every write in turn on a single connection.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait ChatStore: Send + Sync {
  type Error: StoreError;

  // ── Chats ─────────────────────────────────────────────────────────────

  /// All subscribed chats, in no particular order.
  fn list_chats(
    &self,
  ) -> impl Future<Output = Result<Vec<ChatRecord>, Self::Error>> + Send + '_;

  /// Fails with a not-found error if `chat_id` is not subscribed.
  fn get_chat(
    &self,
    chat_id: i64,
  ) -> impl Future<Output = Result<ChatRecord, Self::Error>> + Send + '_;

  /// Subscribe a chat with nothing muted. An existing record for the same
  /// chat is replaced.
  fn add_chat<'a>(
    &'a self,
    chat_id: i64,
    chat: ChatMeta,
    environments: &'a BTreeSet<String>,
    projects: &'a BTreeSet<String>,
  ) -> impl Future<Output = Result<ChatRecord, Self::Error>> + Send + 'a;

  /// Unsubscribe a chat. Returns `false` if it was not subscribed.
  fn remove_chat(
    &self,
    chat_id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Mute state ────────────────────────────────────────────────────────

  /// Mute `tags` for the chat and recompute its alert environments against
  /// `universe`. Returns the updated record.
  fn mute_environments<'a>(
    &'a self,
    chat_id: i64,
    tags: &'a [String],
    universe: &'a BTreeSet<String>,
  ) -> impl Future<Output = Result<ChatRecord, Self::Error>> + Send + 'a;

  /// Project counterpart of [`ChatStore::mute_environments`].
  fn mute_projects<'a>(
    &'a self,
    chat_id: i64,
    tags: &'a [String],
    universe: &'a BTreeSet<String>,
  ) -> impl Future<Output = Result<ChatRecord, Self::Error>> + Send + 'a;

  /// Unmute one environment. Unmuting a tag that is not muted leaves the mute
  /// state unchanged.
  fn unmute_environment<'a>(
    &'a self,
    chat_id: i64,
    tag: &'a str,
    universe: &'a BTreeSet<String>,
  ) -> impl Future<Output = Result<ChatRecord, Self::Error>> + Send + 'a;

  /// Project counterpart of [`ChatStore::unmute_environment`].
  fn unmute_project<'a>(
    &'a self,
    chat_id: i64,
    tag: &'a str,
    universe: &'a BTreeSet<String>,
  ) -> impl Future<Output = Result<ChatRecord, Self::Error>> + Send + 'a;

  fn muted_environments(
    &self,
    chat_id: i64,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  fn muted_projects(
    &self,
    chat_id: i64,
  ) -> impl Future<Output = Result<Vec<String>, Self::Error>> + Send + '_;

  // ── Sent messages ─────────────────────────────────────────────────────

  fn add_message(
    &self,
    message: MessageRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn list_messages(
    &self,
  ) -> impl Future<Output = Result<Vec<MessageRecord>, Self::Error>> + Send + '_;

  /// Remove and return every message sent at least `age` ago.
  ///
  /// This is a destructive read: the returned records are gone from the
  /// store, and the caller is responsible for deleting them from the chat.
  fn list_messages_older_than(
    &self,
    age: TimeDelta,
  ) -> impl Future<Output = Result<Vec<MessageRecord>, Self::Error>> + Send + '_;

  fn delete_all_messages(
    &self,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}
