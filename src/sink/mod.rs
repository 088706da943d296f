//! Database sinks for the incremental sync.
//!
//! The [`Sink`] trait abstracts the analytical database. Implementations:
//!
//! - [`MemorySink`] - in-process tables, for dry runs and tests
//! - [`ClickHouseSink`] - ClickHouse over its HTTP interface (requires the
//!   `clickhouse` feature)
//!
//! Each call is atomic at the row-batch level only; there are no
//! cross-batch transactions.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::error::SinkError;
use crate::rows::{GroupRow, MessageRow, ParticipantRow, TopicRow};

#[cfg(feature = "clickhouse")]
mod clickhouse;
mod memory;

#[cfg(feature = "clickhouse")]
pub use clickhouse::{ClickHouseConfig, ClickHouseSink};
pub use memory::MemorySink;

/// Result type of sink calls.
pub type SinkResult<T> = std::result::Result<T, SinkError>;

/// Storage operations used by the sync writers.
///
/// Sync code takes `&S where S: Sink + ?Sized`, so both concrete sinks and
/// `&dyn Sink` work.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Id of the latest stored message of a group, by `(dt, message_id)`.
    async fn last_message_id(&self, group_id: i64) -> SinkResult<Option<i64>>;

    /// The subset of `user_ids` already stored for the group.
    async fn known_participants(&self, group_id: i64, user_ids: &[i64]) -> SinkResult<HashSet<i64>>;

    /// The subset of `topic_ids` already stored for the group.
    async fn known_topics(&self, group_id: i64, topic_ids: &[i64]) -> SinkResult<HashSet<i64>>;

    /// All stored groups, id to stored title.
    async fn stored_groups(&self) -> SinkResult<HashMap<i64, String>>;

    async fn insert_groups(&self, rows: &[GroupRow]) -> SinkResult<()>;

    async fn insert_messages(&self, rows: &[MessageRow]) -> SinkResult<()>;

    async fn insert_participants(&self, rows: &[ParticipantRow]) -> SinkResult<()>;

    async fn insert_topics(&self, rows: &[TopicRow]) -> SinkResult<()>;
}
