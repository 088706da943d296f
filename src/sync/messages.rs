//! Incremental message sync with lazy topic resolution.

use std::collections::{BTreeSet, HashSet};

use futures::StreamExt;
use tracing::{error, info, warn};

use crate::client::{ChatClient, MessageQuery};
use crate::config::SyncConfig;
use crate::error::Result;
use crate::models::Group;
use crate::rows::{MessageRow, TopicRow};
use crate::sink::Sink;

/// What one group's message sync did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageSyncOutcome {
    pub messages_inserted: usize,
    pub topics_inserted: usize,
    /// Unsupported records skipped
    pub skipped: usize,
    /// The deadline stopped the scan before the stream ended
    pub deadline_hit: bool,
}

/// Resolves topic ids into topic rows, at most once per id per run.
struct TopicResolver<'a, C: ?Sized, S: ?Sized> {
    client: &'a C,
    sink: &'a S,
    group: &'a Group,
    attempted: HashSet<i64>,
}

impl<'a, C, S> TopicResolver<'a, C, S>
where
    C: ChatClient + ?Sized,
    S: Sink + ?Sized,
{
    fn new(client: &'a C, sink: &'a S, group: &'a Group) -> Self {
        Self {
            client,
            sink,
            group,
            attempted: HashSet::new(),
        }
    }

    /// Stores titles for the ids neither stored nor attempted yet.
    async fn flush(&mut self, pending: &mut BTreeSet<i64>) -> Result<usize> {
        let candidates: Vec<i64> = pending
            .iter()
            .copied()
            .filter(|id| !self.attempted.contains(id))
            .collect();
        pending.clear();
        if candidates.is_empty() {
            return Ok(0);
        }
        self.attempted.extend(candidates.iter().copied());

        let known = self.sink.known_topics(self.group.id, &candidates).await?;
        let mut rows = Vec::new();
        for topic_id in candidates.into_iter().filter(|id| !known.contains(id)) {
            let defining = match self.client.message(self.group, topic_id).await {
                Ok(defining) => defining,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => {
                    warn!(
                        group_id = self.group.id,
                        topic_id,
                        error = %e,
                        "Failed to fetch topic definition, skipping"
                    );
                    continue;
                }
            };
            match defining
                .as_ref()
                .and_then(|message| message.action())
                .and_then(|action| action.topic_title())
            {
                Some(title) => rows.push(TopicRow {
                    group_id: self.group.id,
                    topic_id,
                    title: title.to_string(),
                }),
                None => warn!(
                    group_id = self.group.id,
                    topic_id, "Failed to find topic definition, skipping"
                ),
            }
        }

        if !rows.is_empty() {
            self.sink.insert_topics(&rows).await?;
        }
        info!(group = %self.group.title, count = rows.len(), "Updated topics");
        Ok(rows.len())
    }
}

/// Syncs messages newer than the stored high-water mark.
///
/// Scans oldest-first strictly after the latest stored message id, buffering
/// `config.message_batch_size` rows per insert. The deadline is checked before
/// every pull from the stream; once exceeded the buffer is flushed and the
/// scan stops.
pub async fn sync_messages<C, S>(
    client: &C,
    sink: &S,
    group: &Group,
    config: &SyncConfig,
) -> Result<MessageSyncOutcome>
where
    C: ChatClient + ?Sized,
    S: Sink + ?Sized,
{
    let last_id = sink.last_message_id(group.id).await?;
    info!(
        group = %group.title,
        from_message = last_id.unwrap_or(0),
        "Scanning group messages"
    );

    let mut query = MessageQuery::oldest_first().since(config.messages_after);
    if let Some(id) = last_id {
        query = query.after_id(id);
    }

    let mut outcome = MessageSyncOutcome::default();
    let mut topics = TopicResolver::new(client, sink, group);
    let mut pending_topics = BTreeSet::new();
    let mut batch: Vec<MessageRow> = Vec::with_capacity(config.message_batch_size);
    let mut stream = client.messages(group, query);

    loop {
        if config.deadline.is_exceeded() {
            warn!(group = %group.title, "Timeout exceeded, will continue in next run");
            outcome.deadline_hit = true;
            break;
        }
        let Some(item) = stream.next().await else {
            break;
        };
        let message = item?;

        let Some(row) = MessageRow::from_message(group.id, &message) else {
            error!(
                message_id = message.id,
                "Message of type \"{}\" is not supported yet, it will not be saved",
                message.type_name()
            );
            outcome.skipped += 1;
            continue;
        };
        if row.topic_id != 0 {
            pending_topics.insert(row.topic_id);
        }
        batch.push(row);

        if batch.len() >= config.message_batch_size {
            outcome.topics_inserted += topics.flush(&mut pending_topics).await?;
            outcome.messages_inserted += flush_messages(sink, group, &mut batch).await?;
        }
    }

    outcome.topics_inserted += topics.flush(&mut pending_topics).await?;
    outcome.messages_inserted += flush_messages(sink, group, &mut batch).await?;
    info!(group = %group.title, inserted = outcome.messages_inserted, "Done processing messages");
    Ok(outcome)
}

async fn flush_messages<S: Sink + ?Sized>(
    sink: &S,
    group: &Group,
    batch: &mut Vec<MessageRow>,
) -> Result<usize> {
    if batch.is_empty() {
        return Ok(0);
    }
    info!(group = %group.title, count = batch.len(), "Flushing messages");
    sink.insert_messages(batch).await?;
    let flushed = batch.len();
    batch.clear();
    Ok(flushed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{GroupKind, ReplyHeader, ServiceAction, SourceMessage};
    use crate::sink::MemorySink;
    use crate::snapshot::{Failure, FailureKind, Snapshot, SnapshotClient};
    use chrono::{DateTime, TimeZone, Utc};

    fn group() -> Group {
        Group::new(7, "Forum", GroupKind::Megagroup)
    }

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 10, minute, 0).unwrap()
    }

    fn in_topic(id: i64, topic: i64) -> SourceMessage {
        SourceMessage::text(id, at(id as u32), "hi").with_reply_to(ReplyHeader {
            reply_to_msg_id: topic,
            reply_to_top_id: None,
            forum_topic: true,
        })
    }

    #[tokio::test]
    async fn test_batches_flush_at_threshold() {
        let mut snapshot = Snapshot::new().with_group(group());
        for id in 1..=5 {
            snapshot = snapshot.with_message(7, SourceMessage::text(id, at(id as u32), "m"));
        }
        let client = SnapshotClient::new(snapshot);
        let sink = MemorySink::new();
        let config = SyncConfig::new().with_message_batch_size(2);

        let outcome = sync_messages(&client, &sink, &group(), &config).await.unwrap();

        assert_eq!(outcome.messages_inserted, 5);
        // 2 + 2 + remainder 1
        assert_eq!(sink.insert_calls(), 3);
    }

    #[tokio::test]
    async fn test_topics_resolved_once_and_missing_skipped() {
        let snapshot = Snapshot::new()
            .with_group(group())
            .with_message(7, SourceMessage::service(1, at(1), ServiceAction::topic_created("Help")))
            .with_message(7, in_topic(2, 1))
            .with_message(7, in_topic(3, 1))
            .with_message(7, in_topic(4, 99));
        let client = SnapshotClient::new(snapshot);
        let sink = MemorySink::new();
        let config = SyncConfig::new().with_message_batch_size(1);

        let outcome = sync_messages(&client, &sink, &group(), &config).await.unwrap();

        assert_eq!(outcome.topics_inserted, 1);
        let topics = sink.topics();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].topic_id, 1);
        assert_eq!(topics[0].title, "Help");
        assert_eq!(sink.messages().len(), 4);
    }

    #[tokio::test]
    async fn test_failed_topic_lookup_keeps_messages() {
        let snapshot = Snapshot::new()
            .with_group(group())
            .with_message(7, in_topic(1, 99))
            .with_message(7, in_topic(2, 99))
            .with_message(7, in_topic(3, 99))
            .with_lookup_failure(7, Failure::new(FailureKind::Rpc, "MESSAGE_ID_INVALID"));
        let client = SnapshotClient::new(snapshot);
        let sink = MemorySink::new();

        let outcome = sync_messages(&client, &sink, &group(), &SyncConfig::new())
            .await
            .unwrap();

        assert_eq!(outcome.messages_inserted, 3);
        assert_eq!(outcome.topics_inserted, 0);
        assert_eq!(sink.messages().len(), 3);
        assert!(sink.topics().is_empty());
    }

    #[tokio::test]
    async fn test_fatal_topic_lookup_propagates() {
        let snapshot = Snapshot::new()
            .with_group(group())
            .with_message(7, in_topic(1, 99))
            .with_lookup_failure(7, Failure::new(FailureKind::Connection, "reset"));
        let client = SnapshotClient::new(snapshot);
        let sink = MemorySink::new();

        let err = sync_messages(&client, &sink, &group(), &SyncConfig::new())
            .await
            .unwrap_err();

        assert!(err.is_client());
    }

    #[tokio::test]
    async fn test_unsupported_messages_are_skipped() {
        let snapshot = Snapshot::new()
            .with_group(group())
            .with_message(7, SourceMessage::text(1, at(1), "ok"))
            .with_message(7, SourceMessage::unsupported(2, at(2), "MessageEmpty"))
            .with_message(7, SourceMessage::text(3, at(3), "ok"));
        let client = SnapshotClient::new(snapshot);
        let sink = MemorySink::new();

        let outcome = sync_messages(&client, &sink, &group(), &SyncConfig::new())
            .await
            .unwrap();

        assert_eq!(outcome.skipped, 1);
        assert_eq!(outcome.messages_inserted, 2);
    }

    #[tokio::test]
    async fn test_lower_time_bound_applies() {
        let snapshot = Snapshot::new()
            .with_group(group())
            .with_message(7, SourceMessage::text(1, at(1), "old"))
            .with_message(7, SourceMessage::text(2, at(30), "new"));
        let client = SnapshotClient::new(snapshot);
        let sink = MemorySink::new();
        let config = SyncConfig::new().with_messages_after(at(10));

        sync_messages(&client, &sink, &group(), &config).await.unwrap();

        let ids: Vec<i64> = sink.messages().iter().map(|m| m.message_id).collect();
        assert_eq!(ids, vec![2]);
    }
}
