//! Command-line interface definition using clap.
//!
//! This module defines:
//! - [`Args`] - top-level argument structure
//! - [`Command`] - `list-groups`, `export` and `sync`
//! - [`SourceArgs`] - where account data comes from
//! - [`ClickHouseArgs`] - database connection for `sync`
//!
//! Every option of `sync` can also be set through the environment, so the
//! binary runs unchanged as a scheduled job:
//!
//! | Variable | Option |
//! |----------|--------|
//! | `DIALOG_IDS` | `--dialog-ids` (comma-separated) |
//! | `MESSAGES_AFTER` | `--after` |
//! | `SYNC_TIME_BUDGET` | `--time-budget` |
//! | `CH_HOST`, `CH_PORT`, `CH_USER`, `CH_PASS`, `CH_DB`, `CH_CA_CERT_PATH` | `--ch-*` |

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};

use crate::config::{parse_date, parse_duration};

/// Export Telegram groups to CSV files or sync them into ClickHouse.
#[derive(Parser, Debug, Clone)]
#[command(name = "tgexport")]
#[command(version, about, long_about = None)]
#[command(after_help = "EXAMPLES:
    tgexport list-groups --snapshot account.json
    tgexport export --snapshot account.json -g 1001,1002 --after 2024-01-01
    DIALOG_IDS=1001,1002 tgexport sync --snapshot account.json --time-budget 9m
    tgexport sync --snapshot account.json --dialog-ids 1001 --dry-run")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print `title: id` for every group and channel of the account
    ListGroups(SourceArgs),

    /// Write per-group CSV files
    Export(ExportArgs),

    /// Insert new rows into ClickHouse
    Sync(SyncArgs),
}

/// Account data source.
#[derive(clap::Args, Debug, Clone)]
pub struct SourceArgs {
    /// Account snapshot (JSON) replayed as the chat client
    #[arg(long, value_name = "FILE")]
    pub snapshot: PathBuf,
}

#[derive(clap::Args, Debug, Clone)]
pub struct ExportArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Group ids to export
    #[arg(short = 'g', long = "group", value_name = "ID", required = true, value_delimiter = ',')]
    pub groups: Vec<i64>,

    /// Output directory
    #[arg(short, long, default_value = "data")]
    pub output: PathBuf,

    /// Only messages sent at or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_name = "DATE", env = "MESSAGES_AFTER", value_parser = date_arg)]
    pub after: Option<DateTime<Utc>>,
}

#[derive(clap::Args, Debug, Clone)]
pub struct SyncArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Group ids to sync
    #[arg(long, value_name = "IDS", env = "DIALOG_IDS", value_delimiter = ',')]
    pub dialog_ids: Vec<i64>,

    /// Only messages sent at or after this date (YYYY-MM-DD or RFC 3339)
    #[arg(long, value_name = "DATE", env = "MESSAGES_AFTER", value_parser = date_arg)]
    pub after: Option<DateTime<Utc>>,

    /// Wall-clock budget for the run, e.g. `540`, `9m`, `1h`
    #[arg(long, value_name = "DURATION", env = "SYNC_TIME_BUDGET", value_parser = duration_arg)]
    pub time_budget: Option<Duration>,

    /// Write to an in-memory sink and only report what would be inserted
    #[arg(long)]
    pub dry_run: bool,

    #[command(flatten)]
    pub clickhouse: ClickHouseArgs,
}

/// ClickHouse connection options.
#[derive(clap::Args, Debug, Clone)]
pub struct ClickHouseArgs {
    #[arg(long, env = "CH_HOST")]
    pub ch_host: Option<String>,

    #[arg(long, env = "CH_PORT", default_value_t = 8443)]
    pub ch_port: u16,

    #[arg(long, env = "CH_USER", default_value = "default")]
    pub ch_user: String,

    #[arg(long, env = "CH_PASS", default_value = "", hide_env_values = true)]
    pub ch_pass: String,

    #[arg(long, env = "CH_DB", default_value = "default")]
    pub ch_db: String,

    /// Extra root certificate (PEM)
    #[arg(long, env = "CH_CA_CERT_PATH", value_name = "FILE")]
    pub ch_ca_cert: Option<PathBuf>,
}

#[cfg(feature = "clickhouse")]
impl ClickHouseArgs {
    /// Builds the sink configuration; the host is required.
    pub fn to_config(&self) -> crate::Result<crate::sink::ClickHouseConfig> {
        let host = self
            .ch_host
            .as_deref()
            .ok_or_else(|| crate::ExportError::invalid_config("CH_HOST is not set"))?;
        Ok(crate::sink::ClickHouseConfig {
            url: crate::sink::ClickHouseConfig::from_host(host, self.ch_port),
            user: self.ch_user.clone(),
            password: self.ch_pass.clone(),
            database: self.ch_db.clone(),
            ca_cert: self.ch_ca_cert.clone(),
        })
    }
}

fn date_arg(input: &str) -> Result<DateTime<Utc>, String> {
    parse_date(input).map_err(|e| e.to_string())
}

fn duration_arg(input: &str) -> Result<Duration, String> {
    parse_duration(input).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_args() {
        let args = Args::try_parse_from([
            "tgexport", "export", "--snapshot", "a.json", "-g", "1,2", "--group", "3", "--after",
            "2024-01-01",
        ])
        .unwrap();
        let Command::Export(export) = args.command else {
            panic!("expected export");
        };
        assert_eq!(export.groups, vec![1, 2, 3]);
        assert_eq!(export.output, PathBuf::from("data"));
        assert_eq!(export.after.unwrap().to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_sync_args() {
        let args = Args::try_parse_from([
            "tgexport",
            "sync",
            "--snapshot",
            "a.json",
            "--dialog-ids",
            "10,20",
            "--time-budget",
            "5m",
            "--dry-run",
            "--ch-host",
            "ch.local",
        ])
        .unwrap();
        let Command::Sync(sync) = args.command else {
            panic!("expected sync");
        };
        assert_eq!(sync.dialog_ids, vec![10, 20]);
        assert_eq!(sync.time_budget, Some(Duration::from_secs(300)));
        assert!(sync.dry_run);
        assert_eq!(sync.clickhouse.ch_port, 8443);
    }

    #[test]
    fn test_invalid_date_rejected() {
        let result = Args::try_parse_from([
            "tgexport", "export", "--snapshot", "a.json", "-g", "1", "--after", "yesterday",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_export_requires_group() {
        assert!(Args::try_parse_from(["tgexport", "export", "--snapshot", "a.json"]).is_err());
    }
}
