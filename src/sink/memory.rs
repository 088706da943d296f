//! In-memory sink.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::error::SinkError;
use crate::rows::{GroupRow, MessageRow, ParticipantRow, TopicRow};

use super::{Sink, SinkResult};

#[derive(Debug, Default)]
struct Tables {
    groups: Vec<GroupRow>,
    messages: Vec<MessageRow>,
    participants: Vec<ParticipantRow>,
    topics: Vec<TopicRow>,
    insert_calls: usize,
}

/// A [`Sink`] keeping every table in process memory.
///
/// Behaves like an append-only store: inserts never deduplicate, so the
/// sync writers' own dedup is observable.
///
/// # Example
///
/// ```
/// use tgexport::rows::GroupRow;
/// use tgexport::sink::{MemorySink, Sink};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), tgexport::error::SinkError> {
/// let sink = MemorySink::new();
/// sink.insert_groups(&[GroupRow { group_id: 1, name: "Rust".into() }]).await?;
/// assert_eq!(sink.stored_groups().await?.get(&1).map(String::as_str), Some("Rust"));
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MemorySink {
    tables: Mutex<Tables>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> SinkResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| SinkError::Poisoned)
    }

    pub fn groups(&self) -> Vec<GroupRow> {
        self.lock().map(|t| t.groups.clone()).unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<MessageRow> {
        self.lock().map(|t| t.messages.clone()).unwrap_or_default()
    }

    pub fn participants(&self) -> Vec<ParticipantRow> {
        self.lock().map(|t| t.participants.clone()).unwrap_or_default()
    }

    pub fn topics(&self) -> Vec<TopicRow> {
        self.lock().map(|t| t.topics.clone()).unwrap_or_default()
    }

    /// Number of non-empty insert calls received.
    pub fn insert_calls(&self) -> usize {
        self.lock().map(|t| t.insert_calls).unwrap_or_default()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn last_message_id(&self, group_id: i64) -> SinkResult<Option<i64>> {
        let tables = self.lock()?;
        Ok(tables
            .messages
            .iter()
            .filter(|row| row.group_id == group_id)
            .max_by_key(|row| (row.dt, row.message_id))
            .map(|row| row.message_id))
    }

    async fn known_participants(&self, group_id: i64, user_ids: &[i64]) -> SinkResult<HashSet<i64>> {
        let wanted: HashSet<i64> = user_ids.iter().copied().collect();
        let tables = self.lock()?;
        Ok(tables
            .participants
            .iter()
            .filter(|row| row.group_id == group_id && wanted.contains(&row.user_id))
            .map(|row| row.user_id)
            .collect())
    }

    async fn known_topics(&self, group_id: i64, topic_ids: &[i64]) -> SinkResult<HashSet<i64>> {
        let wanted: HashSet<i64> = topic_ids.iter().copied().collect();
        let tables = self.lock()?;
        Ok(tables
            .topics
            .iter()
            .filter(|row| row.group_id == group_id && wanted.contains(&row.topic_id))
            .map(|row| row.topic_id)
            .collect())
    }

    async fn stored_groups(&self) -> SinkResult<HashMap<i64, String>> {
        let tables = self.lock()?;
        Ok(tables
            .groups
            .iter()
            .map(|row| (row.group_id, row.name.clone()))
            .collect())
    }

    async fn insert_groups(&self, rows: &[GroupRow]) -> SinkResult<()> {
        let mut tables = self.lock()?;
        if !rows.is_empty() {
            tables.insert_calls += 1;
        }
        tables.groups.extend_from_slice(rows);
        Ok(())
    }

    async fn insert_messages(&self, rows: &[MessageRow]) -> SinkResult<()> {
        let mut tables = self.lock()?;
        if !rows.is_empty() {
            tables.insert_calls += 1;
        }
        tables.messages.extend_from_slice(rows);
        Ok(())
    }

    async fn insert_participants(&self, rows: &[ParticipantRow]) -> SinkResult<()> {
        let mut tables = self.lock()?;
        if !rows.is_empty() {
            tables.insert_calls += 1;
        }
        tables.participants.extend_from_slice(rows);
        Ok(())
    }

    async fn insert_topics(&self, rows: &[TopicRow]) -> SinkResult<()> {
        let mut tables = self.lock()?;
        if !rows.is_empty() {
            tables.insert_calls += 1;
        }
        tables.topics.extend_from_slice(rows);
        Ok(())
    }
}
