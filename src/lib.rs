//! # tgexport
//!
//! Exports Telegram group chats: messages, participants, forum topics, chat
//! metadata and megagroup statistics.
//!
//! ## Overview
//!
//! Two writers share the same client-side iteration, batching records pulled
//! from the client:
//!
//! - **Flat File Writer** ([`export`]) - rewrites per-group CSV files on every
//!   run
//! - **Dedup Sync Writer** ([`sync`]) - inserts only rows the database does not
//!   have yet, resuming from a per-group high-water mark
//!
//! The protocol client and the database are seams: [`ChatClient`] and
//! [`Sink`]. The crate ships a [`SnapshotClient`](snapshot::SnapshotClient)
//! replaying a recorded account, an in-memory sink and, with the
//! `clickhouse` feature, a ClickHouse sink.
//!
//! ## Quick Start
//!
//! ```rust
//! use tgexport::prelude::*;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<()> {
//! let group = Group::new(1, "Rust", GroupKind::Megagroup);
//! let client = SnapshotClient::new(Snapshot::new().with_group(group.clone()));
//! let sink = MemorySink::new();
//!
//! let report = run_sync(&client, &sink, &[group], &SyncConfig::new()).await?;
//! assert_eq!(report.groups_inserted, 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Structure
//!
//! - [`client`] - [`ChatClient`] trait, [`MessageQuery`](client::MessageQuery)
//! - [`snapshot`] - JSON account snapshots replayed through [`ChatClient`]
//! - [`sink`] - [`Sink`] trait, [`MemorySink`](sink::MemorySink), ClickHouse sink
//! - [`sync`] - Dedup Sync Writer and [`run_sync`](sync::run_sync)
//! - [`export`] - Flat File Writer and [`export_group`](export::export_group)
//! - [`models`] - records yielded by the client
//! - [`rows`] - database rows shaped from the models
//! - [`config`] - [`SyncConfig`](config::SyncConfig), [`ExportConfig`](config::ExportConfig)
//! - [`deadline`] - wall-clock budget
//! - [`cli`] - CLI types (requires the `cli` feature)
//! - [`error`] - [`ExportError`], [`Result`]
//! - [`prelude`] - convenient re-exports

#[cfg(feature = "cli")]
pub mod cli;
pub mod client;
pub mod config;
pub mod deadline;
pub mod error;
pub mod export;
pub mod models;
pub mod rows;
pub mod sink;
pub mod snapshot;
pub mod sync;

// Re-export the main types at the crate root for convenience
pub use client::ChatClient;
pub use error::{ExportError, Result};
pub use sink::Sink;

/// Convenient re-exports for common usage.
///
/// ```rust
/// use tgexport::prelude::*;
/// ```
pub mod prelude {
    // Error types
    pub use crate::error::{ClientError, ExportError, Result, SinkError};

    // Seams
    pub use crate::client::{ChatClient, MessageQuery, ScanOrder};
    pub use crate::sink::{MemorySink, Sink};
    pub use crate::snapshot::{Snapshot, SnapshotClient};

    // Models
    pub use crate::models::{Dialog, Group, GroupKind, SourceMessage, User};

    // Configuration
    pub use crate::config::{ExportConfig, SyncConfig};
    pub use crate::deadline::Deadline;

    // Writers
    pub use crate::export::{ExportSummary, export_group, export_groups};
    pub use crate::sync::{SyncReport, list_groups, run_sync, select_groups};
}
