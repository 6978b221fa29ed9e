//! Key layout and JSON encoding of the values stored in the `kv` table.

use alertgram_core::{chat::ChatRecord, message::MessageRecord};
use rusqlite::OptionalExtension as _;

// ─── Keys ─────────────────────────────────────────────────────────────────────

pub const CHATS_PREFIX: &str = "telegram/chats/";

pub const MESSAGES_KEY: &str = "telegram/messages";

pub fn chat_key(chat_id: i64) -> String { format!("{CHATS_PREFIX}{chat_id}") }

// ─── Values ───────────────────────────────────────────────────────────────────

pub fn encode_chat(chat: &ChatRecord) -> serde_json::Result<String> {
  serde_json::to_string(chat)
}

pub fn decode_chat(s: &str) -> serde_json::Result<ChatRecord> { serde_json::from_str(s) }

pub fn encode_messages(messages: &[MessageRecord]) -> serde_json::Result<String> {
  serde_json::to_string(messages)
}

pub fn decode_messages(s: Option<&str>) -> serde_json::Result<Vec<MessageRecord>> {
  match s {
    Some(s) => serde_json::from_str(s),
    None => Ok(Vec::new()),
  }
}

/// Carry a JSON failure out of a `tokio_rusqlite` closure.
pub fn json_err(e: serde_json::Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(e))
}

// ─── Raw row access ───────────────────────────────────────────────────────────

pub fn get_value(conn: &rusqlite::Connection, key: &str) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT value FROM kv WHERE key = ?1",
      rusqlite::params![key],
      |row| row.get(0),
    )
    .optional()
}

pub fn put_value(conn: &rusqlite::Connection, key: &str, value: &str) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO kv (key, value) VALUES (?1, ?2)
     ON CONFLICT (key) DO UPDATE SET value = excluded.value",
    rusqlite::params![key, value],
  )?;
  Ok(())
}

/// Returns whether a row was deleted.
pub fn delete_value(conn: &rusqlite::Connection, key: &str) -> rusqlite::Result<bool> {
  let n = conn.execute("DELETE FROM kv WHERE key = ?1", rusqlite::params![key])?;
  Ok(n > 0)
}
