//! Megagroup statistics: `overview.csv`, `top_admins.csv` and one CSV per graph.
//!
//! Graph payloads are JSON documents of the form
//!
//! ```json
//! {"columns": [["x", 1700000000000, ...], ["y0", 12, ...]], "names": {"y0": "Joined"}}
//! ```
//!
//! Each column starts with its key. The CSV header maps keys through
//! `names`, and rows are the columns transposed. A row whose first field is
//! a string is a legend row and is skipped; a numeric first field is a
//! millisecond epoch written as a timestamp.

use std::collections::HashMap;
use std::path::Path;

use chrono::DateTime;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info};

use crate::client::ChatClient;
use crate::error::{ExportError, Result};
use crate::models::{Group, MegagroupStats, StatsGraph};

use super::{csv_timestamp, csv_writer, remove_partial};

pub const OVERVIEW_FILE: &str = "overview.csv";
pub const TOP_ADMINS_FILE: &str = "top_admins.csv";

/// Graphs delivered with the statistics.
pub const READY_GRAPHS: [&str; 2] = ["growth_graph", "members_graph"];

/// Graphs that need a token exchange.
pub const ASYNC_GRAPHS: [&str; 4] = [
    "new_members_by_source_graph",
    "languages_graph",
    "messages_graph",
    "actions_graph",
];

/// Which graphs were written and which were left out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsOutcome {
    pub written: Vec<String>,
    pub omitted: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GraphData {
    #[serde(default)]
    columns: Vec<Vec<Value>>,
    #[serde(default)]
    names: HashMap<String, String>,
}

/// Converts a graph payload into CSV records, header first.
///
/// An empty `columns` list gives no records at all.
pub fn graph_records(data: &str) -> Result<Vec<Vec<String>>> {
    let graph: GraphData = serde_json::from_str(data)?;
    if graph.columns.is_empty() {
        return Ok(Vec::new());
    }

    let header: Vec<String> = graph
        .columns
        .iter()
        .map(|column| {
            let key = column.first().map(value_field).unwrap_or_default();
            graph.names.get(&key).cloned().unwrap_or(key)
        })
        .collect();

    let rows = graph.columns.iter().map(Vec::len).min().unwrap_or(0);
    let mut records = vec![header];
    for i in 1..rows {
        let first = &graph.columns[0][i];
        if first.is_string() {
            continue;
        }
        let Some(timestamp) = epoch_millis(first) else {
            return Err(ExportError::invalid_graph(format!(
                "graph x value {first} is not a millisecond timestamp"
            )));
        };
        let mut record = Vec::with_capacity(graph.columns.len());
        record.push(timestamp);
        record.extend(graph.columns[1..].iter().map(|column| value_field(&column[i])));
        records.push(record);
    }
    Ok(records)
}

fn epoch_millis(value: &Value) -> Option<String> {
    let millis = value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f.round() as i64))?;
    DateTime::from_timestamp_millis(millis).map(csv_timestamp)
}

fn value_field(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn write_graph(data: &str, path: &Path) -> Result<()> {
    let records = graph_records(data)?;
    write_records(&records, path)
}

/// Writes `records` to `path`; a file that fails midway is removed.
fn write_records(records: &[Vec<String>], path: &Path) -> Result<()> {
    let written = csv_writer(path).and_then(|mut writer| {
        for record in records {
            writer.write_record(record)?;
        }
        writer.flush()?;
        Ok(())
    });
    if written.is_err() {
        remove_partial(path)?;
    }
    written
}

fn write_overview(stats: &MegagroupStats, dir: &Path) -> Result<()> {
    let mut writer = csv_writer(&dir.join(OVERVIEW_FILE))?;
    writer.write_record([
        "min_date",
        "max_date",
        "members_current",
        "members_previous",
        "messages_current",
        "messages_previous",
        "viewers_current",
        "viewers_previous",
        "posters_current",
        "posters_previous",
    ])?;
    writer.write_record([
        csv_timestamp(stats.period.min_date),
        csv_timestamp(stats.period.max_date),
        stats.members.current.to_string(),
        stats.members.previous.to_string(),
        stats.messages.current.to_string(),
        stats.messages.previous.to_string(),
        stats.viewers.current.to_string(),
        stats.viewers.previous.to_string(),
        stats.posters.current.to_string(),
        stats.posters.previous.to_string(),
    ])?;
    writer.flush()?;
    Ok(())
}

fn write_top_admins(stats: &MegagroupStats, dir: &Path) -> Result<()> {
    let mut writer = csv_writer(&dir.join(TOP_ADMINS_FILE))?;
    writer.write_record(["user_id", "deleted", "kicked", "banned"])?;
    for admin in &stats.top_admins {
        writer.write_record([
            admin.user_id.to_string(),
            admin.deleted.to_string(),
            admin.kicked.to_string(),
            admin.banned.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Fetches the statistics of a megagroup and writes them under `dir`.
///
/// A graph that cannot be obtained is logged and omitted. Failing to fetch
/// the statistics themselves is returned to the caller.
pub async fn write_megagroup_stats<C: ChatClient + ?Sized>(
    client: &C,
    group: &Group,
    dir: &Path,
) -> Result<StatsOutcome> {
    let stats = client.megagroup_stats(group).await?;
    write_overview(&stats, dir)?;

    let mut outcome = StatsOutcome::default();
    for name in READY_GRAPHS.into_iter().chain(ASYNC_GRAPHS) {
        let Some(graph) = stats.graph(name) else {
            continue;
        };
        let graph = match graph {
            StatsGraph::Async { token } => match client.load_async_graph(token).await {
                Ok(loaded) => loaded,
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => StatsGraph::Error {
                    error: e.to_string(),
                },
            },
            other => other.clone(),
        };

        match &graph {
            StatsGraph::Ready { data } => match write_graph(data, &dir.join(format!("{name}.csv"))) {
                Ok(()) => outcome.written.push(name.to_string()),
                Err(e) => {
                    error!(graph = name, "Cannot write {}: {}", name, e);
                    outcome.omitted.push(name.to_string());
                }
            },
            StatsGraph::Error { error } => {
                error!(graph = name, "Cannot load {}: {}", name, error);
                outcome.omitted.push(name.to_string());
            }
            StatsGraph::Async { .. } => {
                error!(graph = name, "Cannot load {}: token exchange returned another token", name);
                outcome.omitted.push(name.to_string());
            }
        }
    }

    write_top_admins(&stats, dir)?;
    info!(
        group = %group.title,
        written = outcome.written.len(),
        omitted = outcome.omitted.len(),
        "Saved megagroup stats"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_records_header_and_legend_rows() {
        let data = r#"{
            "columns": [
                ["x", "legend", 1704067200000, 1704153600000],
                ["y0", "ignored", 5, 7],
                ["y1", "ignored", 1.5, 2]
            ],
            "names": {"y0": "Joined"}
        }"#;
        let records = graph_records(data).unwrap();

        assert_eq!(records[0], vec!["x", "Joined", "y1"]);
        assert_eq!(records.len(), 3);
        assert_eq!(records[1], vec!["2024-01-01 00:00:00+00:00", "5", "1.5"]);
        assert_eq!(records[2], vec!["2024-01-02 00:00:00+00:00", "7", "2"]);
    }

    #[test]
    fn test_graph_records_names_override_x() {
        let data = r#"{
            "columns": [["x", 1704067200000], ["y0", 3]],
            "names": {"x": "Date", "y0": "Views"}
        }"#;
        let records = graph_records(data).unwrap();

        assert_eq!(records[0], vec!["Date", "Views"]);
    }

    #[test]
    fn test_failed_graph_write_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("growth_graph.csv");
        let records = vec![
            vec!["x".to_string(), "y0".to_string()],
            vec!["2024-01-01 00:00:00+00:00".to_string()],
        ];

        assert!(write_records(&records, &path).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_graph_records_zip_to_shortest_column() {
        let data = r#"{"columns": [["x", 0, 1000, 2000], ["y0", 1]], "names": {}}"#;
        let records = graph_records(data).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], vec!["1970-01-01 00:00:00+00:00", "1"]);
    }

    #[test]
    fn test_empty_graph_has_no_records() {
        assert!(graph_records(r#"{"columns": []}"#).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_graph_is_an_error() {
        assert!(graph_records("not json").is_err());
    }
}
