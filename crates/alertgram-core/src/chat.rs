//! Chat records: one subscribed chat and its mute filters.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{mute::MuteSet, universe::Universe};

/// The kind of Telegram chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
  #[default]
  Private,
  Group,
  Supergroup,
  Channel,
}

/// Display metadata for a chat. Opaque to the mute logic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMeta {
  pub kind:       ChatKind,
  pub title:      Option<String>,
  pub username:   Option<String>,
  pub first_name: Option<String>,
}

impl ChatMeta {
  /// `@username` for people, the title for groups, falling back to whatever
  /// is set.
  pub fn display_name(&self) -> String {
    let name = match self.kind {
      ChatKind::Private => self.username.as_ref().or(self.first_name.as_ref()),
      _ => self.title.as_ref().or(self.username.as_ref()),
    };
    match name {
      Some(n) if self.kind == ChatKind::Private && self.username.is_some() => format!("@{n}"),
      Some(n) => n.clone(),
      None => "(unnamed)".to_owned(),
    }
  }
}

/// A subscribed chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRecord {
  pub chat_id:      i64,
  pub chat:         ChatMeta,
  pub environments: MuteSet,
  pub projects:     MuteSet,
}

impl ChatRecord {
  /// A fresh subscription: nothing muted, every known tag alerting.
  pub fn new(
    chat_id: i64,
    chat: ChatMeta,
    environments: &BTreeSet<String>,
    projects: &BTreeSet<String>,
  ) -> Self {
    Self {
      chat_id,
      chat,
      environments: MuteSet::new(environments),
      projects: MuteSet::new(projects),
    }
  }

  /// Subscribe with the whole configured universe.
  pub fn subscribe(chat_id: i64, chat: ChatMeta, universe: &Universe) -> Self {
    Self::new(chat_id, chat, universe.environments(), universe.projects())
  }

  pub fn mute_environments<I, S>(&mut self, tags: I, universe: &BTreeSet<String>)
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.environments.mute(tags, universe);
  }

  pub fn mute_projects<I, S>(&mut self, tags: I, universe: &BTreeSet<String>)
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    self.projects.mute(tags, universe);
  }

  /// Returns `false` if `tag` was not muted; the record is then unchanged.
  pub fn unmute_environment(&mut self, tag: &str, universe: &BTreeSet<String>) -> bool {
    self.environments.unmute(tag, universe)
  }

  /// Returns `false` if `tag` was not muted; the record is then unchanged.
  pub fn unmute_project(&mut self, tag: &str, universe: &BTreeSet<String>) -> bool {
    self.projects.unmute(tag, universe)
  }

  /// An alert is eligible only if both its environment and its project pass.
  pub fn accepts(&self, environment: &str, project: &str) -> bool {
    self.environments.accepts(environment) && self.projects.accepts(project)
  }

  pub fn alert_environments(&self) -> &BTreeSet<String> { self.environments.alert() }

  pub fn alert_projects(&self) -> &BTreeSet<String> { self.projects.alert() }

  pub fn muted_environments(&self) -> &BTreeSet<String> { self.environments.muted() }

  pub fn muted_projects(&self) -> &BTreeSet<String> { self.projects.muted() }
}
