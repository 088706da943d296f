//! First-write-wins group table upsert.

use tracing::{info, warn};

use crate::error::Result;
use crate::models::Group;
use crate::rows::GroupRow;
use crate::sink::Sink;

/// Inserts groups missing from the table; returns how many were inserted.
///
/// A stored title is never changed. A group whose title differs from the
/// stored one is logged and left alone.
pub async fn sync_groups<S: Sink + ?Sized>(sink: &S, groups: &[Group]) -> Result<usize> {
    info!("Updating groups table");
    let stored = sink.stored_groups().await?;

    let mut rows = Vec::new();
    for group in groups {
        match stored.get(&group.id) {
            Some(name) if *name == group.title => {}
            Some(name) => warn!(
                group_id = group.id,
                "Group title was changed: \"{}\"->\"{}\". Keeping old title in DB", name, group.title
            ),
            None if rows.iter().any(|row: &GroupRow| row.group_id == group.id) => {}
            None => {
                info!(group_id = group.id, title = %group.title, "Added group");
                rows.push(GroupRow::from(group));
            }
        }
    }

    if !rows.is_empty() {
        sink.insert_groups(&rows).await?;
    }
    info!("Done updating groups table");
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GroupKind;
    use crate::sink::MemorySink;

    #[tokio::test]
    async fn test_insert_absent_keep_existing_title() {
        let sink = MemorySink::new();
        sink.insert_groups(&[GroupRow {
            group_id: 1,
            name: "Old name".into(),
        }])
        .await
        .unwrap();

        let groups = vec![
            Group::new(1, "New name", GroupKind::Megagroup),
            Group::new(2, "Fresh", GroupKind::Basic),
        ];
        let inserted = sync_groups(&sink, &groups).await.unwrap();

        assert_eq!(inserted, 1);
        let stored = sink.stored_groups().await.unwrap();
        assert_eq!(stored[&1], "Old name");
        assert_eq!(stored[&2], "Fresh");
    }

    #[tokio::test]
    async fn test_identical_title_is_noop() {
        let sink = MemorySink::new();
        let groups = vec![Group::new(5, "Same", GroupKind::Broadcast)];

        assert_eq!(sync_groups(&sink, &groups).await.unwrap(), 1);
        assert_eq!(sync_groups(&sink, &groups).await.unwrap(), 0);
        assert_eq!(sink.groups().len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_group_in_input_inserted_once() {
        let sink = MemorySink::new();
        let group = Group::new(9, "Twice", GroupKind::Basic);
        let inserted = sync_groups(&sink, &[group.clone(), group]).await.unwrap();
        assert_eq!(inserted, 1);
    }
}
