//! Flat File Writer.
//!
//! Writes one directory per group under the output directory, named by
//! [`group_dir_name`]. Every run rewrites the files from scratch:
//!
//! | File | Content |
//! |------|---------|
//! | `info.csv` | group description |
//! | `chats.csv` | related chats |
//! | `messages.csv` | messages down to the lower time bound |
//! | `participants.csv` | non-deleted participants, present only if complete |
//! | `overview.csv`, `top_admins.csv`, `*_graph.csv` | megagroup statistics |
//!
//! All files are comma-delimited UTF-8 with `\n` line endings and a header.

mod info;
mod messages;
mod participants;
mod sanitize;
mod stats;

use std::fs::{self, File};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::client::ChatClient;
use crate::config::ExportConfig;
use crate::error::{ExportError, Result};
use crate::models::Group;

pub use info::{CHATS_FILE, INFO_FILE, write_chat_info, write_chats};
pub use messages::{MESSAGES_FILE, write_messages};
pub use participants::{PARTICIPANTS_FILE, write_participants};
pub use sanitize::{clean_title, group_dir_name};
pub use stats::{
    ASYNC_GRAPHS, OVERVIEW_FILE, READY_GRAPHS, StatsOutcome, TOP_ADMINS_FILE, graph_records,
    write_megagroup_stats,
};

/// What was written for one group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub group_id: i64,
    pub dir: PathBuf,
    pub messages: usize,
    /// `None` when the participants could not be listed
    pub participants: Option<usize>,
    /// `None` for non-megagroups and when statistics were unavailable
    pub stats: Option<StatsOutcome>,
}

/// Awaits `fut`, logging how long it took at debug level.
pub async fn timed<F: Future>(step: &str, fut: F) -> F::Output {
    let start = Instant::now();
    let output = fut.await;
    debug!(step, elapsed = ?start.elapsed(), "Step \"{}\" finished", step);
    output
}

pub(crate) fn csv_writer(path: &Path) -> Result<csv::Writer<File>> {
    let file = File::create(path)?;
    Ok(csv::WriterBuilder::new()
        .delimiter(b',')
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(file))
}

/// Removes a partially written file; a missing file is fine.
pub(crate) fn remove_partial(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(ExportError::Io(e)),
    }
}

/// Timestamp with an explicit UTC offset, e.g. `2024-05-01 09:00:00+00:00`.
pub(crate) fn csv_timestamp(dt: DateTime<Utc>) -> String {
    dt.format("%Y-%m-%d %H:%M:%S%:z").to_string()
}

pub(crate) fn bool_field(value: bool) -> &'static str {
    if value { "1" } else { "0" }
}

/// Exports one group into its directory under `config.output_dir`.
pub async fn export_group<C: ChatClient + ?Sized>(
    client: &C,
    group: &Group,
    config: &ExportConfig,
) -> Result<ExportSummary> {
    info!("Going to load data for chat \"{}\"", group.title);
    let dir = config.output_dir.join(group_dir_name(group.id, &group.title));
    fs::create_dir_all(&dir)?;
    info!(dir = %dir.display(), "Results will be saved");

    let full_chat = client.full_chat(group).await?;
    timed("chat_info", async { write_chat_info(&full_chat, &dir) }).await?;
    timed("chats", async { write_chats(&full_chat, &dir) }).await?;

    let mut stats = None;
    if group.is_megagroup() {
        match timed("megagroup_stats", write_megagroup_stats(client, group, &dir)).await {
            Ok(outcome) => stats = Some(outcome),
            Err(e) if e.as_client().is_some_and(|c| !c.is_fatal()) => {
                warn!(group = %group.title, error = %e, "An error occurred while trying to load megagroup stats");
            }
            Err(e) => return Err(e),
        }
    }

    if group.is_broadcast() {
        match timed("broadcast_stats", client.broadcast_stats(group)).await {
            Ok(()) => warn!("Broadcast stats are not supported"),
            Err(e) if e.is_fatal() => return Err(e.into()),
            Err(e) => debug!(error = %e, "An error occurred while trying to load broadcast stats"),
        }
    }

    let messages = timed(
        "messages",
        write_messages(client, group, &dir, config.messages_after),
    )
    .await?;
    let participants = timed("participants", write_participants(client, group, &dir)).await?;

    Ok(ExportSummary {
        group_id: group.id,
        dir,
        messages,
        participants,
        stats,
    })
}

/// Exports groups one after another.
pub async fn export_groups<C: ChatClient + ?Sized>(
    client: &C,
    groups: &[Group],
    config: &ExportConfig,
) -> Result<Vec<ExportSummary>> {
    let mut summaries = Vec::with_capacity(groups.len());
    for group in groups {
        summaries.push(export_group(client, group, config).await?);
    }
    Ok(summaries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_csv_timestamp_has_offset() {
        let dt = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 1).unwrap();
        assert_eq!(csv_timestamp(dt), "2023-12-31 23:59:01+00:00");
    }

    #[test]
    fn test_bool_field() {
        assert_eq!(bool_field(true), "1");
        assert_eq!(bool_field(false), "0");
    }

    #[tokio::test]
    async fn test_timed_returns_output() {
        assert_eq!(timed("answer", async { 42 }).await, 42);
    }
}
