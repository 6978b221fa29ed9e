//! Integration tests for `SqliteStore` against an in-memory database.

use std::collections::BTreeSet;

use alertgram_core::{
  chat::{ChatKind, ChatMeta},
  message::MessageRecord,
  store::{ChatStore, StoreError},
};
use chrono::{TimeDelta, Utc};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn set(items: &[&str]) -> BTreeSet<String> {
  items.iter().map(|s| s.to_string()).collect()
}

fn envs() -> BTreeSet<String> { set(&["env1", "env2", "env3"]) }

fn prs() -> BTreeSet<String> { set(&["pr1", "pr2"]) }

fn tags(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| s.to_string()).collect()
}

fn message(id: i64, minutes_ago: i64) -> MessageRecord {
  MessageRecord {
    message_id: id,
    chat_id:    1,
    sent_at:    Utc::now() - TimeDelta::minutes(minutes_ago),
  }
}

// ─── Chats ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_chat() {
  let s = store().await;
  let meta = ChatMeta {
    kind:     ChatKind::Group,
    title:    Some("On-call".into()),
    ..Default::default()
  };

  s.add_chat(123, meta.clone(), &envs(), &prs()).await.unwrap();

  let chat = s.get_chat(123).await.unwrap();
  assert_eq!(chat.chat_id, 123);
  assert_eq!(chat.chat, meta);
  assert!(chat.muted_environments().is_empty());
  assert!(chat.muted_projects().is_empty());
  assert_eq!(chat.alert_environments(), &envs());
  assert_eq!(chat.alert_projects(), &prs());
}

#[tokio::test]
async fn get_missing_chat_is_not_found() {
  let s = store().await;
  let err = s.get_chat(404).await.unwrap_err();
  assert!(matches!(err, Error::ChatNotFound(404)));
  assert!(err.is_not_found());
}

#[tokio::test]
async fn add_chat_overwrites_existing_record() {
  let s = store().await;
  s.add_chat(7, ChatMeta::default(), &envs(), &prs()).await.unwrap();
  s.mute_environments(7, &tags(&["env1"]), &envs()).await.unwrap();

  s.add_chat(7, ChatMeta::default(), &envs(), &prs()).await.unwrap();

  let chat = s.get_chat(7).await.unwrap();
  assert!(chat.muted_environments().is_empty());
  assert_eq!(s.list_chats().await.unwrap().len(), 1);
}

#[tokio::test]
async fn list_chats() {
  let s = store().await;
  s.add_chat(134, ChatMeta::default(), &envs(), &prs()).await.unwrap();
  s.add_chat(32, ChatMeta::default(), &envs(), &prs()).await.unwrap();
  s.add_message(message(1, 0)).await.unwrap();

  let mut ids: Vec<i64> = s
    .list_chats()
    .await
    .unwrap()
    .into_iter()
    .map(|c| c.chat_id)
    .collect();
  ids.sort();
  assert_eq!(ids, [32, 134]);
}

#[tokio::test]
async fn remove_chat_reports_presence() {
  let s = store().await;
  s.add_chat(5, ChatMeta::default(), &envs(), &prs()).await.unwrap();

  assert!(s.remove_chat(5).await.unwrap());
  assert!(!s.remove_chat(5).await.unwrap());
  assert!(s.get_chat(5).await.unwrap_err().is_not_found());
}

// ─── Mute state ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn muting_environment() {
  let s = store().await;
  s.add_chat(123, ChatMeta::default(), &envs(), &prs()).await.unwrap();

  s.mute_environments(123, &tags(&["env1"]), &envs()).await.unwrap();

  let chat = s.get_chat(123).await.unwrap();
  assert_eq!(chat.alert_environments().len(), 2);
  assert_eq!(chat.muted_environments().len(), 1);
}

#[tokio::test]
async fn muting_projects() {
  let s = store().await;
  s.add_chat(1233, ChatMeta::default(), &envs(), &prs()).await.unwrap();

  s.mute_projects(1233, &tags(&["pr1"]), &prs()).await.unwrap();

  let chat = s.get_chat(1233).await.unwrap();
  assert_eq!(chat.alert_projects().len(), 1);
  assert_eq!(chat.muted_projects().len(), 1);
}

#[tokio::test]
async fn unmute_environment() {
  let s = store().await;
  s.add_chat(134, ChatMeta::default(), &envs(), &prs()).await.unwrap();

  let chat = s
    .mute_environments(134, &tags(&["env1", "env2"]), &envs())
    .await
    .unwrap();
  assert_eq!(chat.alert_environments().len(), 1);
  assert_eq!(chat.muted_environments().len(), 2);

  s.unmute_environment(134, "env1", &envs()).await.unwrap();

  let chat = s.get_chat(134).await.unwrap();
  assert_eq!(chat.muted_environments(), &set(&["env2"]));
  assert_eq!(chat.alert_environments().len(), 2);
}

#[tokio::test]
async fn unmute_of_unmuted_tag_is_noop() {
  let s = store().await;
  s.add_chat(9, ChatMeta::default(), &envs(), &prs()).await.unwrap();
  s.mute_projects(9, &tags(&["pr2"]), &prs()).await.unwrap();
  let before = s.get_chat(9).await.unwrap();

  s.unmute_project(9, "pr1", &prs()).await.unwrap();
  s.unmute_environment(9, "env1", &envs()).await.unwrap();

  assert_eq!(s.get_chat(9).await.unwrap(), before);
}

#[tokio::test]
async fn repeated_mute_does_not_grow() {
  let s = store().await;
  s.add_chat(11, ChatMeta::default(), &envs(), &prs()).await.unwrap();

  s.mute_environments(11, &tags(&["env1"]), &envs()).await.unwrap();
  s.mute_environments(11, &tags(&["env1", "env1"]), &envs()).await.unwrap();

  assert_eq!(s.muted_environments(11).await.unwrap(), ["env1"]);
}

#[tokio::test]
async fn mute_unsubscribed_chat_is_not_found() {
  let s = store().await;
  let err = s
    .mute_environments(77, &tags(&["env1"]), &envs())
    .await
    .unwrap_err();
  assert!(err.is_not_found());
  assert!(s.list_chats().await.unwrap().is_empty());
}

#[tokio::test]
async fn muted_projections() {
  let s = store().await;
  s.add_chat(3, ChatMeta::default(), &envs(), &prs()).await.unwrap();
  s.mute_environments(3, &tags(&["env3", "env1"]), &envs()).await.unwrap();
  s.mute_projects(3, &tags(&["pr2"]), &prs()).await.unwrap();

  assert_eq!(s.muted_environments(3).await.unwrap(), ["env1", "env3"]);
  assert_eq!(s.muted_projects(3).await.unwrap(), ["pr2"]);
}

#[tokio::test]
async fn concurrent_mutations_of_one_chat_lose_nothing() {
  let s = store().await;
  s.add_chat(1, ChatMeta::default(), &envs(), &prs()).await.unwrap();

  let universe: BTreeSet<String> = (0..20).map(|i| format!("e{i}")).collect();
  let mut handles = Vec::new();
  for tag in universe.iter().cloned() {
    let s = s.clone();
    let universe = universe.clone();
    handles.push(tokio::spawn(async move {
      s.mute_environments(1, &[tag], &universe).await.unwrap();
    }));
  }
  for h in handles {
    h.await.unwrap();
  }

  let chat = s.get_chat(1).await.unwrap();
  assert_eq!(chat.muted_environments(), &universe);
  assert!(chat.alert_environments().is_empty());
}

// ─── Sent messages ───────────────────────────────────────────────────────────

#[tokio::test]
async fn adding_messages() {
  let s = store().await;
  s.delete_all_messages().await.unwrap();

  s.add_message(message(2424, 0)).await.unwrap();
  assert_eq!(s.list_messages().await.unwrap().len(), 1);

  s.add_message(message(12, 0)).await.unwrap();
  let ids: Vec<i64> = s
    .list_messages()
    .await
    .unwrap()
    .into_iter()
    .map(|m| m.message_id)
    .collect();
  assert_eq!(ids, [2424, 12]);
}

#[tokio::test]
async fn messages_older_than_are_taken() {
  let s = store().await;
  s.add_message(message(244, 5)).await.unwrap();
  s.add_message(message(44, 0)).await.unwrap();
  s.add_message(message(45, 2)).await.unwrap();

  let taken = s.list_messages_older_than(TimeDelta::minutes(1)).await.unwrap();
  let mut taken_ids: Vec<i64> = taken.iter().map(|m| m.message_id).collect();
  taken_ids.sort();
  assert_eq!(taken_ids, [45, 244]);

  let kept = s.list_messages().await.unwrap();
  assert_eq!(kept.len(), 1);
  assert_eq!(kept[0].message_id, 44);

  // Taken messages are gone; a second sweep finds nothing.
  assert!(s
    .list_messages_older_than(TimeDelta::minutes(1))
    .await
    .unwrap()
    .is_empty());
}

#[tokio::test]
async fn fresh_messages_are_retained() {
  let s = store().await;
  s.add_message(message(1, 0)).await.unwrap();

  let taken = s.list_messages_older_than(TimeDelta::minutes(1)).await.unwrap();
  assert!(taken.is_empty());
  assert_eq!(s.list_messages().await.unwrap().len(), 1);
}

#[tokio::test]
async fn delete_all_messages() {
  let s = store().await;
  s.add_message(message(1, 0)).await.unwrap();
  s.add_message(message(2, 10)).await.unwrap();

  s.delete_all_messages().await.unwrap();
  assert!(s.list_messages().await.unwrap().is_empty());
  // Deleting an absent list is fine.
  s.delete_all_messages().await.unwrap();
}

#[tokio::test]
async fn records_survive_reopen() {
  let dir = std::env::temp_dir().join(format!("alertgram-test-{}", std::process::id()));
  std::fs::create_dir_all(&dir).unwrap();
  let path = dir.join("store.db");
  let _ = std::fs::remove_file(&path);

  {
    let s = SqliteStore::open(&path).await.unwrap();
    s.add_chat(1, ChatMeta::default(), &envs(), &prs()).await.unwrap();
    s.mute_projects(1, &tags(&["pr1"]), &prs()).await.unwrap();
    s.add_message(message(5, 0)).await.unwrap();
  }

  let s = SqliteStore::open(&path).await.unwrap();
  assert_eq!(s.muted_projects(1).await.unwrap(), ["pr1"]);
  assert_eq!(s.list_messages().await.unwrap().len(), 1);

  drop(s);
  let _ = std::fs::remove_dir_all(&dir);
}
