//! [`SqliteStore`]: the SQLite implementation of [`ChatStore`].

use std::{collections::BTreeSet, path::Path};

use alertgram_core::{
  chat::{ChatMeta, ChatRecord},
  message::MessageRecord,
  store::ChatStore,
};
use chrono::{TimeDelta, Utc};
use rusqlite::TransactionBehavior;

use crate::{
  encode::{
    CHATS_PREFIX, MESSAGES_KEY, chat_key, decode_chat, decode_messages, delete_value,
    encode_chat, encode_messages, get_value, json_err, put_value,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A chat store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. Every
/// read-modify-write runs inside one `IMMEDIATE` transaction on the
/// connection's thread, so concurrent mutations of a chat are linearized and
/// a write either commits whole or not at all. That thread is shared by all
/// chats: writes for different chats are queued one after another, never run
/// in parallel.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Apply `mutate` to one chat record in a single transaction and return
  /// the stored result.
  async fn update_chat<F>(&self, chat_id: i64, mutate: F) -> Result<ChatRecord>
  where
    F: FnOnce(&mut ChatRecord) + Send + 'static,
  {
    let key = chat_key(chat_id);

    let updated: Option<ChatRecord> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(raw) = get_value(&tx, &key)? else {
          return Ok(None);
        };
        let mut chat = decode_chat(&raw).map_err(json_err)?;
        mutate(&mut chat);
        put_value(&tx, &key, &encode_chat(&chat).map_err(json_err)?)?;
        tx.commit()?;
        Ok(Some(chat))
      })
      .await?;

    updated.ok_or(Error::ChatNotFound(chat_id))
  }
}

// ─── ChatStore impl ──────────────────────────────────────────────────────────

impl ChatStore for SqliteStore {
  type Error = Error;

  // ── Chats ─────────────────────────────────────────────────────────────────

  async fn list_chats(&self) -> Result<Vec<ChatRecord>> {
    let pattern = format!("{CHATS_PREFIX}%");

    let raws: Vec<String> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare("SELECT value FROM kv WHERE key LIKE ?1")?;
        let rows = stmt
          .query_map(rusqlite::params![pattern], |row| row.get(0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .iter()
      .map(|raw| decode_chat(raw).map_err(Error::from))
      .collect()
  }

  async fn get_chat(&self, chat_id: i64) -> Result<ChatRecord> {
    let key = chat_key(chat_id);

    let raw: Option<String> = self
      .conn
      .call(move |conn| Ok(get_value(conn, &key)?))
      .await?;

    let raw = raw.ok_or(Error::ChatNotFound(chat_id))?;
    Ok(decode_chat(&raw)?)
  }

  async fn add_chat(
    &self,
    chat_id:      i64,
    chat:         ChatMeta,
    environments: &BTreeSet<String>,
    projects:     &BTreeSet<String>,
  ) -> Result<ChatRecord> {
    let record  = ChatRecord::new(chat_id, chat, environments, projects);
    let key     = chat_key(chat_id);
    let encoded = encode_chat(&record)?;

    self
      .conn
      .call(move |conn| {
        put_value(conn, &key, &encoded)?;
        Ok(())
      })
      .await?;

    tracing::debug!(chat_id, "chat record stored");
    Ok(record)
  }

  async fn remove_chat(&self, chat_id: i64) -> Result<bool> {
    let key = chat_key(chat_id);
    let removed = self
      .conn
      .call(move |conn| Ok(delete_value(conn, &key)?))
      .await?;
    Ok(removed)
  }

  // ── Mute state ────────────────────────────────────────────────────────────

  async fn mute_environments(
    &self,
    chat_id:  i64,
    tags:     &[String],
    universe: &BTreeSet<String>,
  ) -> Result<ChatRecord> {
    let tags     = tags.to_vec();
    let universe = universe.clone();
    self
      .update_chat(chat_id, move |chat| chat.mute_environments(tags, &universe))
      .await
  }

  async fn mute_projects(
    &self,
    chat_id:  i64,
    tags:     &[String],
    universe: &BTreeSet<String>,
  ) -> Result<ChatRecord> {
    let tags     = tags.to_vec();
    let universe = universe.clone();
    self
      .update_chat(chat_id, move |chat| chat.mute_projects(tags, &universe))
      .await
  }

  async fn unmute_environment(
    &self,
    chat_id:  i64,
    tag:      &str,
    universe: &BTreeSet<String>,
  ) -> Result<ChatRecord> {
    let tag      = tag.to_owned();
    let universe = universe.clone();
    self
      .update_chat(chat_id, move |chat| {
        if !chat.unmute_environment(&tag, &universe) {
          tracing::debug!(chat_id, tag = %tag, "environment was not muted");
        }
      })
      .await
  }

  async fn unmute_project(
    &self,
    chat_id:  i64,
    tag:      &str,
    universe: &BTreeSet<String>,
  ) -> Result<ChatRecord> {
    let tag      = tag.to_owned();
    let universe = universe.clone();
    self
      .update_chat(chat_id, move |chat| {
        if !chat.unmute_project(&tag, &universe) {
          tracing::debug!(chat_id, tag = %tag, "project was not muted");
        }
      })
      .await
  }

  async fn muted_environments(&self, chat_id: i64) -> Result<Vec<String>> {
    let chat = self.get_chat(chat_id).await?;
    Ok(chat.muted_environments().iter().cloned().collect())
  }

  async fn muted_projects(&self, chat_id: i64) -> Result<Vec<String>> {
    let chat = self.get_chat(chat_id).await?;
    Ok(chat.muted_projects().iter().cloned().collect())
  }

  // ── Sent messages ─────────────────────────────────────────────────────────

  async fn add_message(&self, message: MessageRecord) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let raw = get_value(&tx, MESSAGES_KEY)?;
        let mut messages = decode_messages(raw.as_deref()).map_err(json_err)?;
        messages.push(message);
        put_value(&tx, MESSAGES_KEY, &encode_messages(&messages).map_err(json_err)?)?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn list_messages(&self) -> Result<Vec<MessageRecord>> {
    let raw: Option<String> = self
      .conn
      .call(|conn| Ok(get_value(conn, MESSAGES_KEY)?))
      .await?;
    Ok(decode_messages(raw.as_deref())?)
  }

  async fn list_messages_older_than(&self, age: TimeDelta) -> Result<Vec<MessageRecord>> {
    let now = Utc::now();

    let expired = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let raw = get_value(&tx, MESSAGES_KEY)?;
        let messages = decode_messages(raw.as_deref()).map_err(json_err)?;

        let (expired, kept): (Vec<_>, Vec<_>) =
          messages.into_iter().partition(|m| m.is_expired(now, age));

        if !expired.is_empty() {
          put_value(&tx, MESSAGES_KEY, &encode_messages(&kept).map_err(json_err)?)?;
          tx.commit()?;
        }
        Ok(expired)
      })
      .await?;

    Ok(expired)
  }

  async fn delete_all_messages(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        delete_value(conn, MESSAGES_KEY)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
