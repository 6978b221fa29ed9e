//! Test doubles and fixtures shared by the bot's unit tests.

use std::{
  collections::{BTreeSet, VecDeque},
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, Ordering},
  },
  time::Duration,
};

use alertgram_core::{
  alert::{Alert, Silence, SourceStatus},
  chat::{ChatMeta, ChatRecord},
  message::MessageRecord,
  source::AlertSource,
  store::{ChatStore, StoreError},
  transport::{InboundMessage, ParseMode, Sender, Transport, Update},
  universe::Universe,
};
use alertgram_store_sqlite::SqliteStore;
use chrono::{TimeDelta, Utc};

use crate::{Bot, config::Settings, metrics::Metrics, render::Renderer};

pub const ADMIN: i64 = 42;
pub const STRANGER: i64 = 7;
pub const CHAT: i64 = 100;

pub type TestBot = Bot<SqliteStore, FakeTransport, FakeSource>;
pub type FlakyBot = Bot<FlakyStore, FakeTransport, FakeSource>;

#[derive(Debug, thiserror::Error)]
#[error("fake {0} failure")]
pub struct FakeError(pub &'static str);

// ─── Transport ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
  pub chat_id: i64,
  pub text:    String,
  pub mode:    ParseMode,
}

#[derive(Default)]
struct TransportState {
  sent:    Vec<Sent>,
  deleted: Vec<MessageRecord>,
  typing:  Vec<i64>,
  failing: BTreeSet<i64>,
  updates: VecDeque<Vec<Update>>,
  offsets: Vec<Option<i64>>,
  next_id: i64,
}

/// Records everything sent through it. Chats marked with
/// [`FakeTransport::fail_chat`] reject sends and deletes.
#[derive(Clone, Default)]
pub struct FakeTransport {
  state: Arc<Mutex<TransportState>>,
}

impl FakeTransport {
  pub fn fail_chat(&self, chat_id: i64) {
    self.state.lock().unwrap().failing.insert(chat_id);
  }

  pub fn push_updates(&self, updates: Vec<Update>) {
    self.state.lock().unwrap().updates.push_back(updates);
  }

  pub fn sent(&self) -> Vec<Sent> { self.state.lock().unwrap().sent.clone() }

  pub fn deleted(&self) -> Vec<MessageRecord> {
    self.state.lock().unwrap().deleted.clone()
  }

  pub fn typing(&self) -> Vec<i64> { self.state.lock().unwrap().typing.clone() }

  pub fn offsets(&self) -> Vec<Option<i64>> { self.state.lock().unwrap().offsets.clone() }
}

impl Transport for FakeTransport {
  type Error = FakeError;

  async fn send(
    &self,
    chat_id: i64,
    text: &str,
    mode: ParseMode,
  ) -> Result<MessageRecord, FakeError> {
    let mut state = self.state.lock().unwrap();
    if state.failing.contains(&chat_id) {
      return Err(FakeError("send"));
    }
    state.next_id += 1;
    state.sent.push(Sent { chat_id, text: text.to_owned(), mode });
    Ok(MessageRecord { message_id: state.next_id, chat_id, sent_at: Utc::now() })
  }

  async fn delete(&self, message: &MessageRecord) -> Result<(), FakeError> {
    let mut state = self.state.lock().unwrap();
    if state.failing.contains(&message.chat_id) {
      return Err(FakeError("delete"));
    }
    state.deleted.push(message.clone());
    Ok(())
  }

  async fn notify_typing(&self, chat_id: i64) -> Result<(), FakeError> {
    self.state.lock().unwrap().typing.push(chat_id);
    Ok(())
  }

  async fn receive(&self, offset: Option<i64>) -> Result<Vec<Update>, FakeError> {
    let next = {
      let mut state = self.state.lock().unwrap();
      state.offsets.push(offset);
      state.updates.pop_front()
    };
    match next {
      Some(updates) => Ok(updates),
      None => {
        tokio::time::sleep(Duration::from_millis(5)).await;
        Ok(Vec::new())
      }
    }
  }
}

// ─── Alert source ────────────────────────────────────────────────────────────

#[derive(Default)]
struct SourceState {
  alerts:   Vec<Alert>,
  silences: Vec<Silence>,
  failing:  bool,
  queries:  Vec<(Option<String>, bool)>,
}

#[derive(Clone, Default)]
pub struct FakeSource {
  state: Arc<Mutex<SourceState>>,
}

impl FakeSource {
  pub fn set_alerts(&self, alerts: Vec<Alert>) {
    self.state.lock().unwrap().alerts = alerts;
  }

  pub fn set_silences(&self, silences: Vec<Silence>) {
    self.state.lock().unwrap().silences = silences;
  }

  pub fn fail(&self) { self.state.lock().unwrap().failing = true; }

  pub fn queries(&self) -> Vec<(Option<String>, bool)> {
    self.state.lock().unwrap().queries.clone()
  }
}

impl AlertSource for FakeSource {
  type Error = FakeError;

  async fn list_alerts(
    &self,
    receiver: Option<&str>,
    include_silenced: bool,
  ) -> Result<Vec<Alert>, FakeError> {
    let mut state = self.state.lock().unwrap();
    state.queries.push((receiver.map(str::to_owned), include_silenced));
    if state.failing {
      return Err(FakeError("alert source"));
    }
    Ok(state.alerts.clone())
  }

  async fn list_silences(&self) -> Result<Vec<Silence>, FakeError> {
    let state = self.state.lock().unwrap();
    if state.failing {
      return Err(FakeError("alert source"));
    }
    Ok(state.silences.clone())
  }

  async fn status(&self) -> Result<SourceStatus, FakeError> {
    if self.state.lock().unwrap().failing {
      return Err(FakeError("alert source"));
    }
    Ok(SourceStatus { version: "0.27.0".into(), uptime: Utc::now() - TimeDelta::hours(3) })
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum FlakyError {
  #[error(transparent)]
  Store(#[from] alertgram_store_sqlite::Error),
  #[error("fake add_message failure")]
  AddMessage,
}

impl StoreError for FlakyError {
  fn is_not_found(&self) -> bool { matches!(self, Self::Store(e) if e.is_not_found()) }
}

/// An in-memory [`SqliteStore`] whose `add_message` can be made to fail.
#[derive(Clone)]
pub struct FlakyStore {
  inner:   SqliteStore,
  failing: Arc<AtomicBool>,
}

impl FlakyStore {
  pub fn fail_add_message(&self) { self.failing.store(true, Ordering::SeqCst); }
}

impl ChatStore for FlakyStore {
  type Error = FlakyError;

  async fn list_chats(&self) -> Result<Vec<ChatRecord>, FlakyError> {
    Ok(self.inner.list_chats().await?)
  }

  async fn get_chat(&self, chat_id: i64) -> Result<ChatRecord, FlakyError> {
    Ok(self.inner.get_chat(chat_id).await?)
  }

  async fn add_chat(
    &self,
    chat_id:      i64,
    chat:         ChatMeta,
    environments: &BTreeSet<String>,
    projects:     &BTreeSet<String>,
  ) -> Result<ChatRecord, FlakyError> {
    Ok(self.inner.add_chat(chat_id, chat, environments, projects).await?)
  }

  async fn remove_chat(&self, chat_id: i64) -> Result<bool, FlakyError> {
    Ok(self.inner.remove_chat(chat_id).await?)
  }

  async fn mute_environments(
    &self,
    chat_id:  i64,
    tags:     &[String],
    universe: &BTreeSet<String>,
  ) -> Result<ChatRecord, FlakyError> {
    Ok(self.inner.mute_environments(chat_id, tags, universe).await?)
  }

  async fn mute_projects(
    &self,
    chat_id:  i64,
    tags:     &[String],
    universe: &BTreeSet<String>,
  ) -> Result<ChatRecord, FlakyError> {
    Ok(self.inner.mute_projects(chat_id, tags, universe).await?)
  }

  async fn unmute_environment(
    &self,
    chat_id:  i64,
    tag:      &str,
    universe: &BTreeSet<String>,
  ) -> Result<ChatRecord, FlakyError> {
    Ok(self.inner.unmute_environment(chat_id, tag, universe).await?)
  }

  async fn unmute_project(
    &self,
    chat_id:  i64,
    tag:      &str,
    universe: &BTreeSet<String>,
  ) -> Result<ChatRecord, FlakyError> {
    Ok(self.inner.unmute_project(chat_id, tag, universe).await?)
  }

  async fn muted_environments(&self, chat_id: i64) -> Result<Vec<String>, FlakyError> {
    Ok(self.inner.muted_environments(chat_id).await?)
  }

  async fn muted_projects(&self, chat_id: i64) -> Result<Vec<String>, FlakyError> {
    Ok(self.inner.muted_projects(chat_id).await?)
  }

  async fn add_message(&self, message: MessageRecord) -> Result<(), FlakyError> {
    if self.failing.load(Ordering::SeqCst) {
      return Err(FlakyError::AddMessage);
    }
    Ok(self.inner.add_message(message).await?)
  }

  async fn list_messages(&self) -> Result<Vec<MessageRecord>, FlakyError> {
    Ok(self.inner.list_messages().await?)
  }

  async fn list_messages_older_than(
    &self,
    age: TimeDelta,
  ) -> Result<Vec<MessageRecord>, FlakyError> {
    Ok(self.inner.list_messages_older_than(age).await?)
  }

  async fn delete_all_messages(&self) -> Result<(), FlakyError> {
    Ok(self.inner.delete_all_messages().await?)
  }
}

// ─── Fixtures ────────────────────────────────────────────────────────────────

pub fn universe() -> Universe {
  Universe::new(["env1", "env2", "env3"], ["pr1", "pr2"]).unwrap()
}

pub fn settings() -> Settings {
  Settings {
    admins:        BTreeSet::from([ADMIN]),
    universe:      universe(),
    receiver:      None,
    fetch_period:  Duration::from_secs(60),
    delete_period: TimeDelta::minutes(60),
    revision:      "test".into(),
    start_time:    Utc::now(),
    renderer:      Renderer::new().unwrap(),
    bot_username:  Some("alertgram_bot".into()),
  }
}

pub async fn bot() -> (TestBot, FakeTransport, FakeSource) { bot_with(settings()).await }

pub async fn bot_with(settings: Settings) -> (TestBot, FakeTransport, FakeSource) {
  let store = SqliteStore::open_in_memory().await.unwrap();
  let transport = FakeTransport::default();
  let source = FakeSource::default();
  let bot = Bot::new(store, transport.clone(), source.clone(), settings, Metrics::new());
  (bot, transport, source)
}

pub async fn flaky_bot() -> (FlakyBot, FakeTransport) {
  let store = FlakyStore {
    inner:   SqliteStore::open_in_memory().await.unwrap(),
    failing: Arc::default(),
  };
  let transport = FakeTransport::default();
  let bot = Bot::new(store, transport.clone(), FakeSource::default(), settings(), Metrics::new());
  (bot, transport)
}

pub fn chat(chat_id: i64, universe: &Universe) -> ChatRecord {
  ChatRecord::subscribe(chat_id, ChatMeta::default(), universe)
}

pub fn alert(name: &str, environment: &str, project: &str) -> Alert {
  let mut alert = Alert::default();
  alert.labels.insert("alertname".into(), name.into());
  alert.labels.insert("environment".into(), environment.into());
  alert.labels.insert("project".into(), project.into());
  alert
}

/// A private message in [`CHAT`] from `sender_id`.
pub fn inbound(text: &str, sender_id: i64) -> InboundMessage {
  InboundMessage {
    chat_id:    CHAT,
    chat:       ChatMeta {
      username:   Some("ada".into()),
      first_name: Some("Ada".into()),
      ..Default::default()
    },
    sender:     Sender { id: sender_id, username: Some("ada".into()), first_name: "Ada".into() },
    text:       text.to_owned(),
    is_private: true,
    is_service: false,
  }
}
