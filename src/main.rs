//! # tgexport CLI
//!
//! Command-line interface for the tgexport library.

use std::collections::HashSet;
use std::process;

use clap::Parser as ClapParser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use tgexport::cli::{Args, Command, ExportArgs, SourceArgs, SyncArgs};
use tgexport::config::{ExportConfig, SyncConfig};
use tgexport::export::export_groups;
use tgexport::sink::{ClickHouseSink, MemorySink, Sink};
use tgexport::snapshot::SnapshotClient;
use tgexport::sync::{SyncReport, list_groups, run_sync, select_groups};
use tgexport::{ChatClient, Result};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(<Args as ClapParser>::parse()).await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    match args.command {
        Command::ListGroups(source) => list(&source).await,
        Command::Export(export) => export_command(export).await,
        Command::Sync(sync) => sync_command(sync).await,
    }
}

fn open_client(source: &SourceArgs) -> Result<SnapshotClient> {
    info!(snapshot = %source.snapshot.display(), "Loading account snapshot");
    SnapshotClient::from_path(&source.snapshot)
}

async fn list(source: &SourceArgs) -> Result<()> {
    let client = open_client(source)?;
    for group in list_groups(&client).await? {
        println!("{}: {}", group.title, group.id);
    }
    Ok(())
}

async fn export_command(args: ExportArgs) -> Result<()> {
    let client = open_client(&args.source)?;
    let ids: HashSet<i64> = args.groups.iter().copied().collect();
    let groups = select_groups(&client, &ids).await?;
    if groups.is_empty() {
        warn!("None of the requested groups were found");
    }

    let mut config = ExportConfig::new().with_output_dir(&args.output);
    if let Some(after) = args.after {
        config = config.with_messages_after(after);
    }

    for summary in export_groups(&client, &groups, &config).await? {
        let participants = summary
            .participants
            .map_or_else(|| "unavailable".to_string(), |n| n.to_string());
        println!(
            "{}: {} messages, participants {}",
            summary.dir.display(),
            summary.messages,
            participants
        );
    }
    Ok(())
}

async fn sync_command(args: SyncArgs) -> Result<()> {
    let client = open_client(&args.source)?;

    let mut config = SyncConfig::new();
    if let Some(after) = args.after {
        config = config.with_messages_after(after);
    }
    if let Some(budget) = args.time_budget {
        config = config.with_time_budget(budget);
    }

    let report = if args.dry_run {
        info!("Dry run, rows go to an in-memory sink");
        sync_into(&client, &MemorySink::new(), &args.dialog_ids, &config).await?
    } else {
        let sink = ClickHouseSink::new(args.clickhouse.to_config()?)?;
        sync_into(&client, &sink, &args.dialog_ids, &config).await?
    };

    println!(
        "groups: {}, messages: {}, topics: {}, participants: {}",
        report.groups_inserted,
        report.messages_inserted,
        report.topics_inserted,
        report.participants_inserted
    );
    if report.deadline_hit {
        println!("deadline reached, the next run continues");
    }
    Ok(())
}

async fn sync_into<C, S>(client: &C, sink: &S, ids: &[i64], config: &SyncConfig) -> Result<SyncReport>
where
    C: ChatClient + ?Sized,
    S: Sink + ?Sized,
{
    let ids: HashSet<i64> = ids.iter().copied().collect();
    if ids.is_empty() {
        warn!("DIALOG_IDS is empty, nothing to sync");
    }
    let groups = select_groups(client, &ids).await?;
    run_sync(client, sink, &groups, config).await
}
