//! The chat transport boundary: sending, deleting and receiving messages.

use std::future::Future;

use crate::{chat::ChatMeta, message::MessageRecord};

/// How the chat client should interpret outbound text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParseMode {
  #[default]
  Plain,
  Html,
}

/// The user who sent an inbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sender {
  pub id:         i64,
  pub username:   Option<String>,
  pub first_name: String,
}

/// A message received from a chat.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundMessage {
  pub chat_id:    i64,
  pub chat:       ChatMeta,
  pub sender:     Sender,
  pub text:       String,
  pub is_private: bool,
  /// Join/leave/pin notices and similar; never treated as commands.
  pub is_service: bool,
}

/// One polled update. `message` is `None` for update kinds the relay does not
/// handle; the id still has to be acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Update {
  pub update_id: i64,
  pub message:   Option<InboundMessage>,
}

/// Outbound and inbound chat operations.
pub trait Transport: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Send `text` to a chat and return a reference to the delivered message.
  fn send<'a>(
    &'a self,
    chat_id: i64,
    text: &'a str,
    mode: ParseMode,
  ) -> impl Future<Output = Result<MessageRecord, Self::Error>> + Send + 'a;

  /// Delete a previously sent message.
  fn delete<'a>(
    &'a self,
    message: &'a MessageRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Show a typing indicator in the chat.
  fn notify_typing(
    &self,
    chat_id: i64,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Wait for updates with ids of at least `offset`.
  fn receive(
    &self,
    offset: Option<i64>,
  ) -> impl Future<Output = Result<Vec<Update>, Self::Error>> + Send + '_;
}
