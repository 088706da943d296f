//! Integration tests for the Flat File Writer.
//!
//! Each test exports a replayed account into a temporary directory and
//! inspects the resulting CSV files.

use std::fs;
use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use tempfile::tempdir;

use tgexport::export::{
    ASYNC_GRAPHS, CHATS_FILE, INFO_FILE, MESSAGES_FILE, OVERVIEW_FILE, PARTICIPANTS_FILE,
    READY_GRAPHS, TOP_ADMINS_FILE,
};
use tgexport::models::{
    AbsValueAndPrev, ChatRef, Entity, FullChat, MegagroupStats, Peer, StatsGraph, StatsPeriod,
    TopAdmin,
};
use tgexport::prelude::*;
use tgexport::snapshot::{Failure, FailureKind};

// ============================================================================
// Fixtures
// ============================================================================

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, hour, minute, 0).unwrap()
}

const GRAPH: &str = r#"{"columns":[["x",1717200000000,1717286400000],["y0",3,4]],"names":{"y0":"Members"}}"#;

fn value(current: f64, previous: f64) -> AbsValueAndPrev {
    AbsValueAndPrev { current, previous }
}

fn ready() -> StatsGraph {
    StatsGraph::Ready {
        data: GRAPH.to_string(),
    }
}

fn token(name: &str) -> StatsGraph {
    StatsGraph::Async {
        token: format!("token-{name}"),
    }
}

fn stats() -> MegagroupStats {
    MegagroupStats {
        period: StatsPeriod {
            min_date: at(0, 0),
            max_date: at(23, 0),
        },
        members: value(120.0, 100.0),
        messages: value(50.0, 40.0),
        viewers: value(80.0, 70.0),
        posters: value(10.0, 9.0),
        growth_graph: ready(),
        members_graph: ready(),
        new_members_by_source_graph: token("sources"),
        languages_graph: token("languages"),
        messages_graph: token("messages"),
        actions_graph: token("actions"),
        top_admins: vec![TopAdmin {
            user_id: 10,
            deleted: 1,
            kicked: 2,
            banned: 3,
        }],
    }
}

fn megagroup() -> Group {
    Group::new(300, "Team #1", GroupKind::Megagroup)
}

fn account() -> Snapshot {
    Snapshot::new()
        .with_group(megagroup())
        .with_full_chat(
            300,
            FullChat {
                about: "Weekly sync".into(),
                chats: vec![
                    Some(ChatRef {
                        id: 300,
                        title: "Team #1".into(),
                    }),
                    None,
                    Some(ChatRef {
                        id: 301,
                        title: "Team archive".into(),
                    }),
                ],
            },
        )
        .with_stats(300, stats())
        .with_async_graph("token-sources", ready())
        .with_async_graph("token-languages", ready())
        .with_async_graph("token-messages", ready())
        .with_async_graph(
            "token-actions",
            StatsGraph::Error {
                error: "NOT_ENOUGH_DATA".into(),
            },
        )
        .with_entity(Entity::User(User::new(10).with_username("ann")))
        .with_participant(300, User::new(10).with_username("ann"))
        .with_participant(300, User::new(11).with_name("Bo", "Li"))
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

fn message_ids(dir: &Path) -> Vec<i64> {
    let mut reader = csv::Reader::from_path(dir.join(MESSAGES_FILE)).unwrap();
    reader
        .records()
        .map(|r| r.unwrap()[0].parse().unwrap())
        .collect()
}

// ============================================================================
// Layout
// ============================================================================

#[tokio::test]
async fn test_group_directory_uses_clean_title() {
    let out = tempdir().unwrap();
    let client = SnapshotClient::new(account());
    let config = ExportConfig::new().with_output_dir(out.path());

    let summary = export_group(&client, &megagroup(), &config).await.unwrap();

    assert_eq!(summary.dir, out.path().join("Team-1"));
    for file in [INFO_FILE, CHATS_FILE, MESSAGES_FILE, PARTICIPANTS_FILE, OVERVIEW_FILE, TOP_ADMINS_FILE] {
        assert!(summary.dir.join(file).exists(), "{file} missing");
    }
}

#[tokio::test]
async fn test_info_and_chats_files() {
    let out = tempdir().unwrap();
    let client = SnapshotClient::new(account());
    let config = ExportConfig::new().with_output_dir(out.path());

    let summary = export_group(&client, &megagroup(), &config).await.unwrap();

    assert_eq!(read(&summary.dir.join(INFO_FILE)), "about\nWeekly sync\n");
    assert_eq!(
        read(&summary.dir.join(CHATS_FILE)),
        "order,id,title\n0,300,Team #1\n2,301,Team archive\n"
    );
}

// ============================================================================
// Messages
// ============================================================================

#[tokio::test]
async fn test_newest_first_scan_stops_at_first_older_message() {
    // Scan order is 5, 4, 3. Message 4 predates the bound and ends the scan,
    // so message 3 is never written although it is newer than the bound.
    let snapshot = account()
        .with_message(300, SourceMessage::text(3, at(10, 3), "late edit").with_from(Peer::User(10)))
        .with_message(300, SourceMessage::text(4, at(8, 0), "old").with_from(Peer::User(10)))
        .with_message(300, SourceMessage::text(5, at(10, 5), "new").with_from(Peer::User(10)));
    let client = SnapshotClient::new(snapshot);
    let out = tempdir().unwrap();
    let config = ExportConfig::new()
        .with_output_dir(out.path())
        .with_messages_after(at(9, 0));

    let summary = export_group(&client, &megagroup(), &config).await.unwrap();

    assert_eq!(summary.messages, 1);
    assert_eq!(message_ids(&summary.dir), vec![5]);
}

#[tokio::test]
async fn test_messages_header() {
    let out = tempdir().unwrap();
    let client = SnapshotClient::new(account());
    let config = ExportConfig::new().with_output_dir(out.path());

    let summary = export_group(&client, &megagroup(), &config).await.unwrap();

    let content = read(&summary.dir.join(MESSAGES_FILE));
    assert_eq!(
        content,
        "message_id,dt,user_id,username_or_channel_title,message_text,is_forwarded,\
         reply_to_message,media,entities,reactions,replies,forwards,service_action\n"
    );
}

// ============================================================================
// Participants
// ============================================================================

#[tokio::test]
async fn test_participants_file_written_when_complete() {
    let out = tempdir().unwrap();
    let client = SnapshotClient::new(account());
    let config = ExportConfig::new().with_output_dir(out.path());

    let summary = export_group(&client, &megagroup(), &config).await.unwrap();

    assert_eq!(summary.participants, Some(2));
    assert_eq!(
        read(&summary.dir.join(PARTICIPANTS_FILE)),
        "user_id,username,name,bot,premium,verified\n10,ann,,0,0,0\n11,,Bo Li,0,0,0\n"
    );
}

#[tokio::test]
async fn test_failed_participant_listing_leaves_no_file() {
    let snapshot = account()
        .with_participants_failure(300, Failure::new(FailureKind::Permission, "CHAT_ADMIN_REQUIRED").after(1));
    let client = SnapshotClient::new(snapshot);
    let out = tempdir().unwrap();
    let config = ExportConfig::new().with_output_dir(out.path());

    let summary = export_group(&client, &megagroup(), &config).await.unwrap();

    assert_eq!(summary.participants, None);
    assert!(!summary.dir.join(PARTICIPANTS_FILE).exists());
    // The rest of the export is unaffected.
    assert!(summary.dir.join(MESSAGES_FILE).exists());
}

// ============================================================================
// Statistics
// ============================================================================

#[tokio::test]
async fn test_one_failing_async_graph_of_four_is_omitted() {
    let out = tempdir().unwrap();
    let client = SnapshotClient::new(account());
    let config = ExportConfig::new().with_output_dir(out.path());

    let summary = export_group(&client, &megagroup(), &config).await.unwrap();
    let stats = summary.stats.unwrap();

    assert_eq!(stats.omitted, vec!["actions_graph".to_string()]);
    let async_written = ASYNC_GRAPHS
        .iter()
        .filter(|name| summary.dir.join(format!("{name}.csv")).exists())
        .count();
    assert_eq!(async_written, 3);
    for name in READY_GRAPHS {
        assert!(summary.dir.join(format!("{name}.csv")).exists());
    }
    assert!(!summary.dir.join("actions_graph.csv").exists());
}

#[tokio::test]
async fn test_graph_and_overview_content() {
    let out = tempdir().unwrap();
    let client = SnapshotClient::new(account());
    let config = ExportConfig::new().with_output_dir(out.path());

    let summary = export_group(&client, &megagroup(), &config).await.unwrap();

    assert_eq!(
        read(&summary.dir.join("growth_graph.csv")),
        "x,Members\n2024-06-01 00:00:00+00:00,3\n2024-06-02 00:00:00+00:00,4\n"
    );
    let overview = read(&summary.dir.join(OVERVIEW_FILE));
    let mut lines = overview.lines();
    assert!(lines.next().unwrap().starts_with("min_date,max_date,members_current"));
    assert_eq!(
        lines.next().unwrap(),
        "2024-06-01 00:00:00+00:00,2024-06-01 23:00:00+00:00,120,100,50,40,80,70,10,9"
    );
    assert_eq!(
        read(&summary.dir.join(TOP_ADMINS_FILE)),
        "user_id,deleted,kicked,banned\n10,1,2,3\n"
    );
}

#[tokio::test]
async fn test_missing_stats_do_not_fail_export() {
    let mut snapshot = account();
    snapshot.chats.get_mut(&300).unwrap().stats = None;
    let client = SnapshotClient::new(snapshot);
    let out = tempdir().unwrap();
    let config = ExportConfig::new().with_output_dir(out.path());

    let summary = export_group(&client, &megagroup(), &config).await.unwrap();

    assert!(summary.stats.is_none());
    assert!(!summary.dir.join(OVERVIEW_FILE).exists());
    assert!(summary.dir.join(PARTICIPANTS_FILE).exists());
}

#[tokio::test]
async fn test_channel_gets_no_stats_files() {
    let channel = Group::new(400, "News", GroupKind::Broadcast);
    let snapshot = Snapshot::new()
        .with_group(channel.clone())
        .with_message(400, SourceMessage::text(1, at(12, 0), "post"));
    let client = SnapshotClient::new(snapshot);
    let out = tempdir().unwrap();
    let config = ExportConfig::new().with_output_dir(out.path());

    let summary = export_group(&client, &channel, &config).await.unwrap();

    assert!(summary.stats.is_none());
    assert!(!summary.dir.join(OVERVIEW_FILE).exists());
    let content = read(&summary.dir.join(MESSAGES_FILE));
    assert!(content.contains("1,2024-06-01 12:00:00+00:00,,News,post,0,,,,,0,0,"));
}
