//! Telegram Bot API transport.
//!
//! Covers the handful of methods the relay uses: `getMe`, `sendMessage`,
//! `deleteMessage`, `sendChatAction` and long-polling `getUpdates`.
//! Docs: <https://core.telegram.org/bots/api>

use std::time::Duration;

use alertgram_core::{
  chat::{ChatKind, ChatMeta},
  message::MessageRecord,
  transport::{InboundMessage, ParseMode, Sender, Transport, Update},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::json;

/// Seconds `getUpdates` waits for new updates before returning empty.
pub const POLL_TIMEOUT_SECS: u64 = 10;

/// HTTP timeout for every call; must outlast the long poll.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(POLL_TIMEOUT_SECS + 20);

#[derive(Debug, thiserror::Error)]
pub enum TelegramError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),
  #[error("telegram api error {code}: {description}")]
  Api { code: i64, description: String },
  #[error("telegram returned no result for {0}")]
  MissingResult(&'static str),
}

/// A Bot API client for one bot token.
#[derive(Clone)]
pub struct TelegramClient {
  client:   reqwest::Client,
  base_url: String,
}

impl std::fmt::Debug for TelegramClient {
  // The base URL embeds the bot token.
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("TelegramClient").finish_non_exhaustive()
  }
}

impl TelegramClient {
  pub fn new(api_url: &str, token: &str) -> Result<Self, TelegramError> {
    let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
    Ok(Self {
      client,
      base_url: format!("{}/bot{token}", api_url.trim_end_matches('/')),
    })
  }

  async fn call<P, R>(&self, method: &'static str, params: &P) -> Result<R, TelegramError>
  where
    P: Serialize + ?Sized,
    R: DeserializeOwned,
  {
    let response: ApiResponse<R> = self
      .client
      .post(format!("{}/{method}", self.base_url))
      .json(params)
      .send()
      .await?
      .json()
      .await?;

    if !response.ok {
      return Err(TelegramError::Api {
        code:        response.error_code.unwrap_or_default(),
        description: response.description.unwrap_or_default(),
      });
    }
    response.result.ok_or(TelegramError::MissingResult(method))
  }

  /// The bot's own `@username`, used to tell commands addressed to it from
  /// commands for other bots in the same group.
  pub async fn username(&self) -> Result<Option<String>, TelegramError> {
    let me: TgUser = self.call("getMe", &json!({})).await?;
    Ok(me.username)
  }
}

impl Transport for TelegramClient {
  type Error = TelegramError;

  async fn send(
    &self,
    chat_id: i64,
    text: &str,
    mode: ParseMode,
  ) -> Result<MessageRecord, TelegramError> {
    let mut params = json!({
      "chat_id": chat_id,
      "text": text,
      "disable_web_page_preview": true,
    });
    if let Some(mode) = parse_mode(mode) {
      params["parse_mode"] = json!(mode);
    }

    let sent: TgMessage = self.call("sendMessage", &params).await?;
    tracing::debug!(chat_id, message_id = sent.message_id, "message sent");
    Ok(MessageRecord {
      message_id: sent.message_id,
      chat_id:    sent.chat.id,
      sent_at:    DateTime::from_timestamp(sent.date, 0).unwrap_or_else(Utc::now),
    })
  }

  async fn delete(&self, message: &MessageRecord) -> Result<(), TelegramError> {
    let params = json!({ "chat_id": message.chat_id, "message_id": message.message_id });
    let _: bool = self.call("deleteMessage", &params).await?;
    Ok(())
  }

  async fn notify_typing(&self, chat_id: i64) -> Result<(), TelegramError> {
    let params = json!({ "chat_id": chat_id, "action": "typing" });
    let _: bool = self.call("sendChatAction", &params).await?;
    Ok(())
  }

  async fn receive(&self, offset: Option<i64>) -> Result<Vec<Update>, TelegramError> {
    let mut params = json!({
      "timeout": POLL_TIMEOUT_SECS,
      "allowed_updates": ["message"],
    });
    if let Some(offset) = offset {
      params["offset"] = json!(offset);
    }
    let updates: Vec<TgUpdate> = self.call("getUpdates", &params).await?;
    Ok(updates.into_iter().map(Update::from).collect())
  }
}

fn parse_mode(mode: ParseMode) -> Option<&'static str> {
  match mode {
    ParseMode::Plain => None,
    ParseMode::Html => Some("HTML"),
  }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ApiResponse<T> {
  ok:          bool,
  result:      Option<T>,
  description: Option<String>,
  error_code:  Option<i64>,
}

#[derive(Deserialize)]
struct TgUpdate {
  update_id: i64,
  message:   Option<TgMessage>,
}

#[derive(Deserialize)]
struct TgMessage {
  message_id:         i64,
  date:               i64,
  chat:               TgChat,
  from:               Option<TgUser>,
  text:               Option<String>,
  new_chat_members:   Option<serde_json::Value>,
  left_chat_member:   Option<serde_json::Value>,
  new_chat_title:     Option<String>,
  pinned_message:     Option<serde_json::Value>,
  group_chat_created: Option<bool>,
}

impl TgMessage {
  fn is_service(&self) -> bool {
    self.new_chat_members.is_some()
      || self.left_chat_member.is_some()
      || self.new_chat_title.is_some()
      || self.pinned_message.is_some()
      || self.group_chat_created.unwrap_or(false)
  }
}

#[derive(Deserialize)]
struct TgChat {
  id:         i64,
  #[serde(rename = "type")]
  kind:       String,
  title:      Option<String>,
  username:   Option<String>,
  first_name: Option<String>,
}

#[derive(Deserialize)]
struct TgUser {
  id:         i64,
  username:   Option<String>,
  #[serde(default)]
  first_name: String,
}

impl From<TgChat> for ChatMeta {
  fn from(chat: TgChat) -> Self {
    let kind = match chat.kind.as_str() {
      "group" => ChatKind::Group,
      "supergroup" => ChatKind::Supergroup,
      "channel" => ChatKind::Channel,
      _ => ChatKind::Private,
    };
    ChatMeta { kind, title: chat.title, username: chat.username, first_name: chat.first_name }
  }
}

impl From<TgUpdate> for Update {
  fn from(update: TgUpdate) -> Self {
    let message = update.message.map(|m| {
      let is_service = m.is_service();
      let chat_id = m.chat.id;
      let chat = ChatMeta::from(m.chat);
      let sender = m
        .from
        .map(|u| Sender { id: u.id, username: u.username, first_name: u.first_name })
        .unwrap_or_default();
      InboundMessage {
        chat_id,
        is_private: chat.kind == ChatKind::Private,
        chat,
        sender,
        text: m.text.unwrap_or_default(),
        is_service,
      }
    });
    Update { update_id: update.update_id, message }
  }
}
