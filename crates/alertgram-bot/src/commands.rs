//! Chat commands and the update polling loop.
//!
//! Every command except `/id` is reserved for admins. Messages from anyone
//! else are dropped without a reply. Failures while executing a command are
//! answered in the chat; the loop always moves on to the next update.

use std::time::Duration;

use alertgram_core::{
  chat::ChatRecord,
  command::{Command, parse_mute, parse_unmute},
  source::AlertSource,
  store::ChatStore,
  text::{MAX_MESSAGE_LEN, truncate_message},
  transport::{InboundMessage, ParseMode, Transport},
};
use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::{Bot, Error, Result, metrics::DROPPED};

/// Pause before polling again after `getUpdates` failed.
const POLL_RETRY: Duration = Duration::from_secs(5);

/// A reply to send back into the chat a command came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
  pub text: String,
  pub mode: ParseMode,
}

impl Reply {
  pub fn plain(text: impl Into<String>) -> Self {
    Self { text: text.into(), mode: ParseMode::Plain }
  }

  pub fn html(text: impl Into<String>) -> Self {
    Self { text: text.into(), mode: ParseMode::Html }
  }
}

pub fn help_text() -> String {
  let mut out = format!(
    "I'm an Alertmanager bot for Telegram. I will notify you about alerts.\n\
     You can also ask me about my {}, {} & {}\n\nAvailable commands:\n",
    Command::Status.as_str(),
    Command::Alerts.as_str(),
    Command::Silences.as_str(),
  );
  for command in Command::ALL {
    out.push_str(&format!("{} - {}\n", command.as_str(), command.description()));
  }
  out.push_str(
    "\nMute syntax: /mute environment[env1,env2],project[pr1]\n\
     or /mute environment[env1] or /mute project[pr1]; /mute_del takes the same forms.",
  );
  out
}

fn join(tags: impl IntoIterator<Item = impl AsRef<str>>) -> String {
  let tags: Vec<String> = tags.into_iter().map(|t| t.as_ref().to_owned()).collect();
  if tags.is_empty() { "none".to_owned() } else { tags.join(", ") }
}

fn mute_summary(chat: &ChatRecord) -> String {
  format!(
    "Muted environments: {}\nMuted projects: {}",
    join(chat.muted_environments()),
    join(chat.muted_projects()),
  )
}

impl<S, T, A> Bot<S, T, A>
where
  S: ChatStore + 'static,
  T: Transport + 'static,
  A: AlertSource + 'static,
{
  /// Handle one inbound message and answer it in its chat.
  pub async fn handle_message(&self, message: &InboundMessage) {
    tracing::debug!(chat_id = message.chat_id, text = %message.text, "message received");

    let reply = match self.process(message).await {
      Ok(Some(reply)) => reply,
      Ok(None) => return,
      Err(e @ Error::Forbidden { .. }) => {
        tracing::info!(
          error = %e,
          sender_id = message.sender.id,
          sender_username = message.sender.username.as_deref().unwrap_or_default(),
          "failed to process message"
        );
        return;
      }
      Err(e) => {
        tracing::warn!(chat_id = message.chat_id, error = %e, "command failed");
        Reply::plain(format!("Sorry, that did not work: {e}"))
      }
    };

    if reply.text.len() > MAX_MESSAGE_LEN {
      let len = reply.text.len();
      tracing::warn!(chat_id = message.chat_id, len, "reply too long, truncating");
    }
    let text = truncate_message(&reply.text);
    if let Err(e) = self.transport.send(message.chat_id, &text, reply.mode).await {
      tracing::warn!(chat_id = message.chat_id, error = %e, "failed to send reply");
    }
  }

  /// Decide what to answer to `message`. `Ok(None)` means stay silent.
  pub async fn process(&self, message: &InboundMessage) -> Result<Option<Reply>> {
    if message.is_service {
      return Ok(None);
    }
    let bot = self.settings.bot_username.as_deref();
    let Some(command) = Command::parse(&message.text, bot) else {
      return Ok(None);
    };

    if command == Command::Id {
      self.metrics.command(command.label());
      return Ok(Some(Reply::plain(format!(
        "Chat id: {}\nYour id: {}",
        message.chat_id, message.sender.id
      ))));
    }
    if !self.settings.is_admin(message.sender.id) {
      self.metrics.command(DROPPED);
      return Err(Error::Forbidden { sender_id: message.sender.id });
    }

    self.metrics.command(command.label());
    if let Err(e) = self.transport.notify_typing(message.chat_id).await {
      tracing::debug!(chat_id = message.chat_id, error = %e, "typing indicator failed");
    }
    self.execute(command, message).await.map(Some)
  }

  async fn execute(&self, command: Command, message: &InboundMessage) -> Result<Reply> {
    let chat_id = message.chat_id;
    let universe = &self.settings.universe;

    match command {
      Command::Start => {
        self
          .store
          .add_chat(chat_id, message.chat.clone(), universe.environments(), universe.projects())
          .await
          .map_err(Error::store)?;
        tracing::info!(
          chat_id,
          user_id = message.sender.id,
          username = message.sender.username.as_deref().unwrap_or_default(),
          "chat subscribed"
        );
        Ok(Reply::plain(format!(
          "Hey, {}! I will now keep you up to date!\n{}",
          message.sender.first_name,
          Command::Help.as_str()
        )))
      }

      Command::Stop => {
        let removed = self.store.remove_chat(chat_id).await.map_err(Error::store)?;
        if !removed {
          return Ok(Reply::plain("This chat was not subscribed."));
        }
        tracing::info!(chat_id, user_id = message.sender.id, "chat unsubscribed");
        Ok(Reply::plain(format!(
          "Alright, {}! I won't talk to you again.\n{}",
          message.sender.first_name,
          Command::Help.as_str()
        )))
      }

      Command::Help => Ok(Reply::plain(help_text())),

      Command::Chats => {
        let mut chats = self.store.list_chats().await.map_err(Error::store)?;
        if chats.is_empty() {
          return Ok(Reply::plain("No chats have subscribed yet."));
        }
        chats.sort_by_key(|c| c.chat_id);
        let list: Vec<String> = chats.iter().map(|c| c.chat.display_name()).collect();
        Ok(Reply::plain(format!("Currently these chats have subscribed:\n{}", list.join("\n"))))
      }

      Command::Status => {
        let status = self.source.status().await.map_err(Error::source)?;
        Ok(Reply::html(self.settings.renderer.status(
          &status.version,
          status.uptime,
          &self.settings.revision,
          self.settings.start_time,
          Utc::now(),
        )?))
      }

      Command::Alerts => {
        let alerts = self
          .source
          .list_alerts(self.settings.receiver.as_deref(), false)
          .await
          .map_err(Error::source)?;
        if alerts.is_empty() {
          return Ok(Reply::plain("No alerts right now! 🎉"));
        }
        Ok(Reply::html(self.settings.renderer.alert_list(&alerts)?))
      }

      Command::Silences => {
        let silences = self.source.list_silences().await.map_err(Error::source)?;
        if silences.is_empty() {
          return Ok(Reply::plain("No silences right now."));
        }
        Ok(Reply::html(self.settings.renderer.silence_list(&silences)?))
      }

      Command::Mute => {
        let selection = parse_mute(&message.text)?;
        let mut chat = None;
        if !selection.environments.is_empty() {
          chat = Some(
            self
              .store
              .mute_environments(chat_id, &selection.environments, universe.environments())
              .await
              .map_err(Error::store)?,
          );
        }
        if !selection.projects.is_empty() {
          chat = Some(
            self
              .store
              .mute_projects(chat_id, &selection.projects, universe.projects())
              .await
              .map_err(Error::store)?,
          );
        }
        let chat = match chat {
          Some(chat) => chat,
          None => self.store.get_chat(chat_id).await.map_err(Error::store)?,
        };
        Ok(Reply::plain(format!(
          "You were successfully muted environments and/or projects.\n{}",
          mute_summary(&chat)
        )))
      }

      Command::MuteDel => {
        let selection = parse_unmute(&message.text)?;
        let mut chat = self.store.get_chat(chat_id).await.map_err(Error::store)?;
        for tag in &selection.environments {
          chat = self
            .store
            .unmute_environment(chat_id, tag, universe.environments())
            .await
            .map_err(Error::store)?;
        }
        for tag in &selection.projects {
          chat = self
            .store
            .unmute_project(chat_id, tag, universe.projects())
            .await
            .map_err(Error::store)?;
        }
        Ok(Reply::plain(format!(
          "You were successfully deleted mute from environments and/or projects.\n{}",
          mute_summary(&chat)
        )))
      }

      Command::Environments => Ok(Reply::plain(format!(
        "The following environments are available: {}",
        join(universe.environments())
      ))),

      Command::Projects => Ok(Reply::plain(format!(
        "The following projects are available: {}",
        join(universe.projects())
      ))),

      Command::MutedEnvs => {
        let muted = self.store.muted_environments(chat_id).await.map_err(Error::store)?;
        if muted.is_empty() {
          return Ok(Reply::plain("No muted environments"));
        }
        Ok(Reply::plain(format!("Muted environments: {}", join(&muted))))
      }

      Command::MutedPrs => {
        let muted = self.store.muted_projects(chat_id).await.map_err(Error::store)?;
        if muted.is_empty() {
          return Ok(Reply::plain("No muted projects"));
        }
        Ok(Reply::plain(format!("Muted projects: {}", join(&muted))))
      }

      // Answered before the admin check.
      Command::Id => Ok(Reply::plain(format!("Chat id: {chat_id}"))),
    }
  }

  /// Long-poll for updates and handle them one at a time until cancelled.
  pub(crate) async fn poll_loop(&self, cancel: CancellationToken) -> Result<()> {
    let mut offset = None;
    loop {
      let polled = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        polled = self.transport.receive(offset) => polled,
      };

      match polled {
        Ok(updates) => {
          for update in updates {
            offset = Some(update.update_id + 1);
            if let Some(message) = update.message {
              self.handle_message(&message).await;
            }
          }
        }
        Err(e) => {
          tracing::warn!(error = %e, "failed to poll updates");
          tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            _ = tokio::time::sleep(POLL_RETRY) => {}
          }
        }
      }
    }
  }
}
