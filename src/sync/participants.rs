//! Additive participant sync.

use std::collections::HashSet;

use futures::StreamExt;
use tracing::{info, warn};

use crate::client::ChatClient;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::models::{Group, User};
use crate::rows::ParticipantRow;
use crate::sink::Sink;

/// What one group's participant sync did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParticipantSyncOutcome {
    pub inserted: usize,
    /// The deadline stopped the listing before it ended
    pub deadline_hit: bool,
    /// The account may not list this group's participants
    pub permission_denied: bool,
}

/// Inserts participants not yet stored for the group.
///
/// Rows are never updated: each batch is checked against the stored
/// `(group_id, user_id)` pairs and only the complement is inserted. Deleted
/// accounts are skipped. A permission error ends this group's listing
/// without failing the run; any other client error propagates.
pub async fn sync_participants<C, S>(
    client: &C,
    sink: &S,
    group: &Group,
    config: &SyncConfig,
) -> Result<ParticipantSyncOutcome>
where
    C: ChatClient + ?Sized,
    S: Sink + ?Sized,
{
    info!(group = %group.title, "Updating participants");
    let mut outcome = ParticipantSyncOutcome::default();
    let mut batch: Vec<User> = Vec::with_capacity(config.participant_batch_size);
    let mut stream = client.participants(group);

    loop {
        if config.deadline.is_exceeded() {
            warn!(group = %group.title, "Timeout exceeded, will continue in next run");
            outcome.deadline_hit = true;
            break;
        }
        let Some(item) = stream.next().await else {
            break;
        };
        let user = match item {
            Ok(user) => user,
            Err(e) if e.is_permission() => {
                warn!(group = %group.title, error = %e, "An error occurred while trying to load participants");
                outcome.permission_denied = true;
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if !user.deleted {
            batch.push(user);
        }
        if batch.len() >= config.participant_batch_size {
            outcome.inserted += flush_participants(sink, group.id, &mut batch).await?;
        }
    }

    outcome.inserted += flush_participants(sink, group.id, &mut batch).await?;
    info!(group = %group.title, inserted = outcome.inserted, "Done participants");
    Ok(outcome)
}

async fn flush_participants<S: Sink + ?Sized>(
    sink: &S,
    group_id: i64,
    batch: &mut Vec<User>,
) -> Result<usize> {
    if batch.is_empty() {
        return Ok(0);
    }
    let ids: Vec<i64> = batch.iter().map(|user| user.id).collect();
    let mut skip: HashSet<i64> = sink.known_participants(group_id, &ids).await?;

    let rows: Vec<ParticipantRow> = batch
        .drain(..)
        .filter(|user| skip.insert(user.id))
        .map(|user| ParticipantRow::from_user(group_id, &user))
        .collect();

    if !rows.is_empty() {
        sink.insert_participants(&rows).await?;
        info!(group_id, count = rows.len(), "Updated participants");
    }
    Ok(rows.len())
}
