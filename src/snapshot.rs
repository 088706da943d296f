//! Replay an account snapshot through the [`ChatClient`] trait.
//!
//! A snapshot is a JSON document holding everything the exporters can ask a
//! live client for: dialogs, per-group messages and participants, resolvable
//! entities, full chat info, statistics and async graph payloads. Failures
//! can be scripted per group to reproduce permission errors, broken
//! participant listings and failing single-message lookups. A per-record
//! delay makes streams behave like a slow connection.
//!
//! Messages are replayed in message-id order, which is the order a server
//! pages through history.
//!
//! # Example
//!
//! ```
//! use tgexport::models::{Group, GroupKind, User};
//! use tgexport::snapshot::{Snapshot, SnapshotClient};
//!
//! let group = Group::new(1, "Rust", GroupKind::Megagroup);
//! let snapshot = Snapshot::new()
//!     .with_group(group)
//!     .with_participant(1, User::new(10).with_username("ferris"));
//!
//! let client = SnapshotClient::new(snapshot);
//! assert_eq!(client.fetched_records(), 0);
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use serde::{Deserialize, Serialize};

use crate::client::{ChatClient, ClientResult, MessageQuery, ScanOrder};
use crate::error::{ClientError, ExportError, Result};
use crate::models::{
    Dialog, Entity, FullChat, Group, MegagroupStats, Peer, SourceMessage, StatsGraph, User,
};

/// Class of a scripted failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Permission,
    Rpc,
    Unauthorized,
    Connection,
}

/// A scripted failure, raised after `after` records were yielded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Failure {
    #[serde(default)]
    pub after: usize,
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            after: 0,
            kind,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn after(mut self, records: usize) -> Self {
        self.after = records;
        self
    }

    pub fn to_error(&self) -> ClientError {
        match self.kind {
            FailureKind::Permission => ClientError::PermissionDenied(self.message.clone()),
            FailureKind::Rpc => ClientError::rpc(400, self.message.clone()),
            FailureKind::Unauthorized => ClientError::Unauthorized(self.message.clone()),
            FailureKind::Connection => ClientError::Connection(self.message.clone()),
        }
    }
}

/// Everything recorded for one group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatSnapshot {
    #[serde(default)]
    pub messages: Vec<SourceMessage>,
    #[serde(default)]
    pub participants: Vec<User>,
    #[serde(default)]
    pub participants_failure: Option<Failure>,
    /// Raised by every single-message lookup in this group
    #[serde(default)]
    pub lookup_failure: Option<Failure>,
    #[serde(default)]
    pub full_chat: FullChat,
    #[serde(default)]
    pub stats: Option<MegagroupStats>,
    #[serde(default)]
    pub broadcast_stats: bool,
}

/// A recorded account.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub dialogs: Vec<Dialog>,
    /// Per-group records keyed by group id
    #[serde(default)]
    pub chats: HashMap<i64, ChatSnapshot>,
    #[serde(default)]
    pub entities: Vec<Entity>,
    /// Async graph payloads keyed by token
    #[serde(default)]
    pub async_graphs: HashMap<String, StatsGraph>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a snapshot from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content)
            .map_err(|e| ExportError::snapshot(e, Some(path.to_path_buf())))
    }

    /// Parses a snapshot from a JSON string.
    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| ExportError::snapshot(e, None))
    }

    /// Adds a group dialog.
    #[must_use]
    pub fn with_group(mut self, group: Group) -> Self {
        self.chats.entry(group.id).or_default();
        self.dialogs.push(Dialog::Group(group));
        self
    }

    /// Adds a private dialog.
    #[must_use]
    pub fn with_user_dialog(mut self, user: User) -> Self {
        self.dialogs.push(Dialog::User(user));
        self
    }

    #[must_use]
    pub fn with_message(mut self, group_id: i64, message: SourceMessage) -> Self {
        self.chats.entry(group_id).or_default().messages.push(message);
        self
    }

    #[must_use]
    pub fn with_participant(mut self, group_id: i64, user: User) -> Self {
        self.chats
            .entry(group_id)
            .or_default()
            .participants
            .push(user);
        self
    }

    #[must_use]
    pub fn with_participants_failure(mut self, group_id: i64, failure: Failure) -> Self {
        self.chats.entry(group_id).or_default().participants_failure = Some(failure);
        self
    }

    #[must_use]
    pub fn with_lookup_failure(mut self, group_id: i64, failure: Failure) -> Self {
        self.chats.entry(group_id).or_default().lookup_failure = Some(failure);
        self
    }

    #[must_use]
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.push(entity);
        self
    }

    #[must_use]
    pub fn with_full_chat(mut self, group_id: i64, full_chat: FullChat) -> Self {
        self.chats.entry(group_id).or_default().full_chat = full_chat;
        self
    }

    #[must_use]
    pub fn with_stats(mut self, group_id: i64, stats: MegagroupStats) -> Self {
        self.chats.entry(group_id).or_default().stats = Some(stats);
        self
    }

    #[must_use]
    pub fn with_async_graph(mut self, token: impl Into<String>, graph: StatsGraph) -> Self {
        self.async_graphs.insert(token.into(), graph);
        self
    }
}

/// A [`ChatClient`] answering from a [`Snapshot`].
///
/// Counts every record yielded by its streams, so callers can observe how
/// many fetch iterations an exporter performed.
#[derive(Debug)]
pub struct SnapshotClient {
    snapshot: Snapshot,
    fetched: AtomicUsize,
    delay: Duration,
}

impl SnapshotClient {
    pub fn new(snapshot: Snapshot) -> Self {
        Self {
            snapshot,
            fetched: AtomicUsize::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Waits `delay` before yielding each streamed record.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Snapshot::from_path(path)?))
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Records yielded by message and participant streams so far.
    pub fn fetched_records(&self) -> usize {
        self.fetched.load(Ordering::SeqCst)
    }

    fn chat(&self, group: &Group) -> ClientResult<&ChatSnapshot> {
        self.snapshot
            .chats
            .get(&group.id)
            .ok_or_else(|| ClientError::NotFound(format!("group {}", group.id)))
    }

    fn counted<'a, T: Send + 'a>(
        &'a self,
        items: Vec<ClientResult<T>>,
    ) -> BoxStream<'a, ClientResult<T>> {
        let delay = self.delay;
        stream::iter(items)
            .then(move |item| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                item
            })
            .inspect(move |_| {
                self.fetched.fetch_add(1, Ordering::SeqCst);
            })
            .boxed()
    }
}

#[async_trait]
impl ChatClient for SnapshotClient {
    fn dialogs(&self) -> BoxStream<'_, ClientResult<Dialog>> {
        stream::iter(self.snapshot.dialogs.clone().into_iter().map(Ok)).boxed()
    }

    fn messages<'a>(
        &'a self,
        group: &'a Group,
        query: MessageQuery,
    ) -> BoxStream<'a, ClientResult<SourceMessage>> {
        let chat = match self.chat(group) {
            Ok(chat) => chat,
            Err(e) => return stream::iter(vec![Err(e)]).boxed(),
        };

        let mut messages: Vec<SourceMessage> = chat
            .messages
            .iter()
            .filter(|message| query.accepts(message))
            .cloned()
            .collect();
        match query.order {
            ScanOrder::NewestFirst => messages.sort_by(|a, b| b.id.cmp(&a.id)),
            ScanOrder::OldestFirst => messages.sort_by_key(|message| message.id),
        }

        self.counted(messages.into_iter().map(Ok).collect())
    }

    fn participants<'a>(&'a self, group: &'a Group) -> BoxStream<'a, ClientResult<User>> {
        let chat = match self.chat(group) {
            Ok(chat) => chat,
            Err(e) => return stream::iter(vec![Err(e)]).boxed(),
        };

        let mut items: Vec<ClientResult<User>> = Vec::new();
        match &chat.participants_failure {
            Some(failure) => {
                items.extend(chat.participants.iter().take(failure.after).cloned().map(Ok));
                items.push(Err(failure.to_error()));
            }
            None => items.extend(chat.participants.iter().cloned().map(Ok)),
        }

        self.counted(items)
    }

    async fn message(&self, group: &Group, id: i64) -> ClientResult<Option<SourceMessage>> {
        let chat = self.chat(group)?;
        if let Some(failure) = &chat.lookup_failure {
            return Err(failure.to_error());
        }
        Ok(chat.messages.iter().find(|message| message.id == id).cloned())
    }

    async fn entity(&self, peer: Peer) -> ClientResult<Entity> {
        self.snapshot
            .entities
            .iter()
            .find(|entity| entity.matches(peer))
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("peer {}", peer.id())))
    }

    async fn full_chat(&self, group: &Group) -> ClientResult<FullChat> {
        Ok(self.chat(group)?.full_chat.clone())
    }

    async fn megagroup_stats(&self, group: &Group) -> ClientResult<MegagroupStats> {
        self.chat(group)?
            .stats
            .clone()
            .ok_or_else(|| ClientError::PermissionDenied("CHAT_ADMIN_REQUIRED".to_string()))
    }

    async fn broadcast_stats(&self, group: &Group) -> ClientResult<()> {
        if self.chat(group)?.broadcast_stats {
            Ok(())
        } else {
            Err(ClientError::rpc(400, "BROADCAST_REQUIRED"))
        }
    }

    async fn load_async_graph(&self, token: &str) -> ClientResult<StatsGraph> {
        self.snapshot
            .async_graphs
            .get(token)
            .cloned()
            .ok_or_else(|| ClientError::NotFound(format!("graph token {token}")))
    }
}
