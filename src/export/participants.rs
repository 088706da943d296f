//! `participants.csv`. The file exists only if the listing completed.

use std::path::Path;

use futures::StreamExt;
use tracing::warn;

use crate::client::ChatClient;
use crate::error::Result;
use crate::models::Group;

use super::{bool_field, csv_writer, remove_partial};

pub const PARTICIPANTS_FILE: &str = "participants.csv";

/// Writes every non-deleted participant.
///
/// Returns `Ok(Some(rows))` on success. On any failure the partial file is
/// removed; a non-fatal client error (e.g. missing admin rights) is logged
/// and yields `Ok(None)`, everything else is returned.
pub async fn write_participants<C: ChatClient + ?Sized>(
    client: &C,
    group: &Group,
    dir: &Path,
) -> Result<Option<usize>> {
    let path = dir.join(PARTICIPANTS_FILE);
    match write_all(client, group, &path).await {
        Ok(written) => Ok(Some(written)),
        Err(e) => {
            remove_partial(&path)?;
            match e.as_client() {
                Some(client_error) if !client_error.is_fatal() => {
                    warn!(group = %group.title, error = %e, "An error occurred while trying to load participants");
                    Ok(None)
                }
                _ => Err(e),
            }
        }
    }
}

async fn write_all<C: ChatClient + ?Sized>(client: &C, group: &Group, path: &Path) -> Result<usize> {
    let mut writer = csv_writer(path)?;
    writer.write_record(["user_id", "username", "name", "bot", "premium", "verified"])?;

    let mut written = 0;
    let mut stream = client.participants(group);
    while let Some(item) = stream.next().await {
        let user = item?;
        if user.deleted {
            continue;
        }
        writer.write_record([
            user.id.to_string(),
            user.username.clone().unwrap_or_default(),
            user.display_name(),
            bool_field(user.bot).to_string(),
            bool_field(user.premium).to_string(),
            bool_field(user.verified).to_string(),
        ])?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}
