//! Dedup Sync Writer.
//!
//! Persists only new rows to a [`Sink`]:
//!
//! - [`sync_messages`] - resumes after the stored high-water mark, resolving
//!   forum topics on the way
//! - [`sync_participants`] - inserts users not yet stored for the group
//! - [`sync_groups`] - first-write-wins group titles
//!
//! [`run_sync`] launches all of them for a set of groups concurrently on the
//! caller's task, sharing one client and one sink.
//!
//! # Example
//!
//! ```
//! use tgexport::config::SyncConfig;
//! use tgexport::models::{Group, GroupKind, User};
//! use tgexport::sink::MemorySink;
//! use tgexport::snapshot::{Snapshot, SnapshotClient};
//! use tgexport::sync::run_sync;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> tgexport::Result<()> {
//! let group = Group::new(1, "Rust", GroupKind::Megagroup);
//! let client = SnapshotClient::new(
//!     Snapshot::new()
//!         .with_group(group.clone())
//!         .with_participant(1, User::new(10)),
//! );
//! let sink = MemorySink::new();
//!
//! let report = run_sync(&client, &sink, &[group], &SyncConfig::new()).await?;
//! assert_eq!(report.groups_inserted, 1);
//! assert_eq!(report.participants_inserted, 1);
//! # Ok(())
//! # }
//! ```

mod groups;
mod messages;
mod participants;

use std::collections::HashSet;

use futures::future::{self, BoxFuture, FutureExt};
use futures::TryStreamExt;
use tracing::{debug, error, info};

use crate::client::ChatClient;
use crate::config::SyncConfig;
use crate::error::{ExportError, Result};
use crate::models::Group;
use crate::sink::Sink;

pub use groups::sync_groups;
pub use messages::{MessageSyncOutcome, sync_messages};
pub use participants::{ParticipantSyncOutcome, sync_participants};

/// Totals of one sync run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub groups_inserted: usize,
    pub messages_inserted: usize,
    pub topics_inserted: usize,
    pub participants_inserted: usize,
    /// Unsupported messages skipped
    pub messages_skipped: usize,
    /// Groups whose participants could not be listed
    pub participants_denied: usize,
    /// Some stream stopped on the deadline; the next run continues it
    pub deadline_hit: bool,
}

impl SyncReport {
    /// Rows inserted across all tables.
    pub fn total_rows(&self) -> usize {
        self.groups_inserted
            + self.messages_inserted
            + self.topics_inserted
            + self.participants_inserted
    }

    fn absorb(&mut self, outcome: TaskOutcome) {
        match outcome {
            TaskOutcome::Groups(inserted) => self.groups_inserted += inserted,
            TaskOutcome::Messages(m) => {
                self.messages_inserted += m.messages_inserted;
                self.topics_inserted += m.topics_inserted;
                self.messages_skipped += m.skipped;
                self.deadline_hit |= m.deadline_hit;
            }
            TaskOutcome::Participants(p) => {
                self.participants_inserted += p.inserted;
                self.participants_denied += usize::from(p.permission_denied);
                self.deadline_hit |= p.deadline_hit;
            }
        }
    }
}

enum TaskOutcome {
    Groups(usize),
    Messages(MessageSyncOutcome),
    Participants(ParticipantSyncOutcome),
}

/// Lists every group or channel dialog of the account.
pub async fn list_groups<C: ChatClient + ?Sized>(client: &C) -> Result<Vec<Group>> {
    let dialogs: Vec<_> = client.dialogs().try_collect().await?;
    let mut groups = Vec::new();
    for dialog in dialogs {
        match dialog.as_group() {
            Some(group) => groups.push(group.clone()),
            None => debug!(dialog = %dialog.title(), "Not a group or channel, skipping"),
        }
    }
    Ok(groups)
}

/// Group dialogs whose id is in `ids`, in dialog order.
pub async fn select_groups<C: ChatClient + ?Sized>(
    client: &C,
    ids: &HashSet<i64>,
) -> Result<Vec<Group>> {
    let groups: Vec<Group> = list_groups(client)
        .await?
        .into_iter()
        .filter(|group| ids.contains(&group.id))
        .collect();
    if groups.len() < ids.len() {
        let found: HashSet<i64> = groups.iter().map(|group| group.id).collect();
        for missing in ids.difference(&found) {
            debug!(group_id = missing, "Requested group not among dialogs");
        }
    }
    Ok(groups)
}

/// Syncs groups, then every group's messages and participants.
///
/// All tasks run interleaved on the current task. A failing task does not
/// cancel the others; failures are logged and the first one is returned
/// once every task has finished.
pub async fn run_sync<C, S>(
    client: &C,
    sink: &S,
    groups: &[Group],
    config: &SyncConfig,
) -> Result<SyncReport>
where
    C: ChatClient + ?Sized,
    S: Sink + ?Sized,
{
    info!(groups = groups.len(), "Starting sync");
    let mut tasks: Vec<BoxFuture<'_, Result<TaskOutcome>>> = Vec::with_capacity(groups.len() * 2 + 1);
    tasks.push(sync_groups(sink, groups).map(|r| r.map(TaskOutcome::Groups)).boxed());
    for group in groups {
        tasks.push(
            sync_messages(client, sink, group, config)
                .map(|r| r.map(TaskOutcome::Messages))
                .boxed(),
        );
        tasks.push(
            sync_participants(client, sink, group, config)
                .map(|r| r.map(TaskOutcome::Participants))
                .boxed(),
        );
    }

    let mut report = SyncReport::default();
    let mut first_error: Option<ExportError> = None;
    for result in future::join_all(tasks).await {
        match result {
            Ok(outcome) => report.absorb(outcome),
            Err(e) => {
                error!(error = %e, "Sync task failed");
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => {
            info!(
                rows = report.total_rows(),
                deadline_hit = report.deadline_hit,
                "Sync finished"
            );
            Ok(report)
        }
    }
}
