//! Domain model of the Alertgram relay: Alertmanager payloads, subscribed
//! chats with their mute state, the command grammar, and the `ChatStore`,
//! `Transport` and `AlertSource` traits the bot is written against.
//!
//! Storage, Telegram and Alertmanager clients live in other crates.

pub mod alert;
pub mod chat;
pub mod command;
pub mod error;
pub mod message;
pub mod mute;
pub mod source;
pub mod store;
pub mod text;
pub mod transport;
pub mod universe;

pub use error::{Error, Result};
