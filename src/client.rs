//! The messaging-protocol client seam.
//!
//! Connection handling, authentication, rate limiting and pagination belong
//! to the client library. The exporters only see the [`ChatClient`] trait:
//! paginated record streams plus a few point lookups.
//!
//! Streams are [`BoxStream`]s; each item pulled from one is one fetch
//! iteration as far as the exporters are concerned.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;

use crate::error::ClientError;
use crate::models::{Dialog, Entity, FullChat, Group, MegagroupStats, Peer, SourceMessage, StatsGraph, User};

/// Result type of client calls.
pub type ClientResult<T> = std::result::Result<T, ClientError>;

/// Direction of a message scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanOrder {
    /// Newest message first (the server's natural order)
    #[default]
    NewestFirst,
    /// Oldest message first
    OldestFirst,
}

/// Parameters of a message scan.
///
/// # Example
///
/// ```
/// use tgexport::client::{MessageQuery, ScanOrder};
///
/// let resume = MessageQuery::oldest_first().after_id(120);
/// assert_eq!(resume.order, ScanOrder::OldestFirst);
/// assert_eq!(resume.after_id, Some(120));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageQuery {
    pub order: ScanOrder,
    /// Only messages with an id strictly greater than this
    pub after_id: Option<i64>,
    /// Only messages sent at or after this time
    pub since: Option<DateTime<Utc>>,
}

impl MessageQuery {
    /// Full history, newest first.
    pub fn newest_first() -> Self {
        Self::default()
    }

    /// Full history, oldest first.
    pub fn oldest_first() -> Self {
        Self {
            order: ScanOrder::OldestFirst,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn after_id(mut self, id: i64) -> Self {
        self.after_id = Some(id);
        self
    }

    #[must_use]
    pub fn since(mut self, since: Option<DateTime<Utc>>) -> Self {
        self.since = since;
        self
    }

    /// Returns `true` if `message` falls inside the id/time window.
    pub fn accepts(&self, message: &SourceMessage) -> bool {
        self.after_id.is_none_or(|after| message.id > after)
            && self.since.is_none_or(|since| message.date >= since)
    }
}

/// Operations the exporters need from a messaging-protocol client.
///
/// Implementations own retries and rate limiting. An error yielded by a
/// stream ends that stream.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// All dialogs of the account.
    fn dialogs(&self) -> BoxStream<'_, ClientResult<Dialog>>;

    /// Messages of a group, in the query's order and window.
    fn messages<'a>(
        &'a self,
        group: &'a Group,
        query: MessageQuery,
    ) -> BoxStream<'a, ClientResult<SourceMessage>>;

    /// Participants of a group, deleted accounts included.
    fn participants<'a>(&'a self, group: &'a Group) -> BoxStream<'a, ClientResult<User>>;

    /// A single message by id.
    async fn message(&self, group: &Group, id: i64) -> ClientResult<Option<SourceMessage>>;

    /// Resolves a peer to a user, channel or chat.
    async fn entity(&self, peer: Peer) -> ClientResult<Entity>;

    /// Static metadata of a group.
    async fn full_chat(&self, group: &Group) -> ClientResult<FullChat>;

    /// Statistics of a megagroup.
    async fn megagroup_stats(&self, group: &Group) -> ClientResult<MegagroupStats>;

    /// Probes broadcast statistics of a channel.
    async fn broadcast_stats(&self, group: &Group) -> ClientResult<()>;

    /// Exchanges an async graph token for graph data.
    async fn load_async_graph(&self, token: &str) -> ClientResult<StatsGraph>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_query_window() {
        let date = Utc.with_ymd_and_hms(2024, 1, 10, 0, 0, 0).unwrap();
        let msg = SourceMessage::text(5, date, "x");

        assert!(MessageQuery::newest_first().accepts(&msg));
        assert!(MessageQuery::oldest_first().after_id(4).accepts(&msg));
        assert!(!MessageQuery::oldest_first().after_id(5).accepts(&msg));

        let since_same = Some(date);
        let since_later = Some(Utc.with_ymd_and_hms(2024, 1, 11, 0, 0, 0).unwrap());
        assert!(MessageQuery::oldest_first().since(since_same).accepts(&msg));
        assert!(!MessageQuery::oldest_first().since(since_later).accepts(&msg));
    }
}
