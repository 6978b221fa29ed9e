//! Chat command recognition and the mute/unmute grammar.
//!
//! | Form | Meaning |
//! |------|---------|
//! | `/mute environment[e1,e2],project[p1,p2]` | mute both lists |
//! | `/mute environment[e1]` | mute environments only |
//! | `/mute project[p1]` | mute projects only |
//! | `/mute_del ...` | same forms, unmute each listed tag |
//!
//! List items are word characters separated by commas; whitespace around
//! items is stripped.

use std::sync::LazyLock;

use regex::Regex;

use crate::{Error, Result};

// ─── Commands ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
  Start,
  Stop,
  Help,
  Chats,
  Status,
  Alerts,
  Silences,
  Mute,
  MuteDel,
  Environments,
  Projects,
  MutedEnvs,
  MutedPrs,
  /// Reports the chat and sender ids; answered for anyone.
  Id,
}

impl Command {
  pub const ALL: [Command; 14] = [
    Command::Start,
    Command::Stop,
    Command::Help,
    Command::Chats,
    Command::Status,
    Command::Alerts,
    Command::Silences,
    Command::Mute,
    Command::MuteDel,
    Command::Environments,
    Command::Projects,
    Command::MutedEnvs,
    Command::MutedPrs,
    Command::Id,
  ];

  /// Recognise the command word at the start of `text`.
  ///
  /// In group chats Telegram appends `@username` to disambiguate bots. A
  /// command addressed to a username other than `bot` is not ours and yields
  /// `None`, like plain text and unknown commands. With `bot` unknown every
  /// suffix is accepted. Usernames compare case-insensitively.
  pub fn parse(text: &str, bot: Option<&str>) -> Option<Self> {
    let word = text.split_whitespace().next()?;
    let word = match word.split_once('@') {
      Some((word, target)) => {
        if bot.is_some_and(|bot| !bot.eq_ignore_ascii_case(target)) {
          return None;
        }
        word
      }
      None => word,
    };
    Self::ALL.into_iter().find(|c| c.as_str() == word)
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Start => "/start",
      Self::Stop => "/stop",
      Self::Help => "/help",
      Self::Chats => "/chats",
      Self::Status => "/status",
      Self::Alerts => "/alerts",
      Self::Silences => "/silences",
      Self::Mute => "/mute",
      Self::MuteDel => "/mute_del",
      Self::Environments => "/environments",
      Self::Projects => "/projects",
      Self::MutedEnvs => "/muted_envs",
      Self::MutedPrs => "/muted_prs",
      Self::Id => "/id",
    }
  }

  /// Metric label: the command word without the slash.
  pub fn label(self) -> &'static str { &self.as_str()[1..] }

  pub fn description(self) -> &'static str {
    match self {
      Self::Start => "Subscribe for alerts.",
      Self::Stop => "Unsubscribe for alerts.",
      Self::Help => "Show this help.",
      Self::Chats => "List all users and group chats that subscribed.",
      Self::Status => "Print the current status.",
      Self::Alerts => "List all alerts.",
      Self::Silences => "List all silences.",
      Self::Mute => "Mute environments and/or projects.",
      Self::MuteDel => "Delete mute.",
      Self::Environments => "List all environments for alerts.",
      Self::Projects => "List all projects for alerts.",
      Self::MutedEnvs => "List all muted environments.",
      Self::MutedPrs => "List all muted projects.",
      Self::Id => "Show the ids of this chat and of you.",
    }
  }
}

// ─── Mute grammar ────────────────────────────────────────────────────────────

/// Environments and projects named by a mute or unmute command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSelection {
  pub environments: Vec<String>,
  pub projects:     Vec<String>,
}

const LIST: &str = r"(\w+(?:\s*,\s*\w+)*)";

struct Grammar {
  both:        Regex,
  environment: Regex,
  project:     Regex,
}

impl Grammar {
  fn new(command: &str) -> Self {
    let head = format!(r"^\s*{}(?:@\w+)?\s+", regex::escape(command));
    let compile = |body: String| {
      Regex::new(&format!("{head}{body}")).expect("mute grammar is a valid regex")
    };
    Self {
      both:        compile(format!(r"environment\[{LIST}\],[ ]?project\[{LIST}\]")),
      environment: compile(format!(r"environment\[{LIST}\]")),
      project:     compile(format!(r"project\[{LIST}\]")),
    }
  }

  fn parse(&self, text: &str) -> Result<TagSelection> {
    if let Some(caps) = self.both.captures(text) {
      return Ok(TagSelection {
        environments: split_list(&caps[1]),
        projects:     split_list(&caps[2]),
      });
    }
    if let Some(caps) = self.environment.captures(text) {
      return Ok(TagSelection {
        environments: split_list(&caps[1]),
        projects:     Vec::new(),
      });
    }
    if let Some(caps) = self.project.captures(text) {
      return Ok(TagSelection {
        environments: Vec::new(),
        projects:     split_list(&caps[1]),
      });
    }
    Err(Error::NoMatch(excerpt(text)))
  }
}

/// Characters of the offending text quoted back in [`Error::NoMatch`].
const EXCERPT_CHARS: usize = 64;

fn excerpt(text: &str) -> String {
  match text.char_indices().nth(EXCERPT_CHARS) {
    Some((end, _)) => format!("{}...", &text[..end]),
    None => text.to_owned(),
  }
}

static MUTE: LazyLock<Grammar> = LazyLock::new(|| Grammar::new(Command::Mute.as_str()));
static MUTE_DEL: LazyLock<Grammar> =
  LazyLock::new(|| Grammar::new(Command::MuteDel.as_str()));

fn split_list(list: &str) -> Vec<String> {
  list.split(',').map(|item| item.trim().to_owned()).collect()
}

/// Parse a `/mute ...` command.
pub fn parse_mute(text: &str) -> Result<TagSelection> { MUTE.parse(text) }

/// Parse a `/mute_del ...` command.
pub fn parse_unmute(text: &str) -> Result<TagSelection> { MUTE_DEL.parse(text) }
