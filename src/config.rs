//! Configuration types for the two exporters.
//!
//! These structs carry no CLI framework dependencies; the binary fills them
//! from flags and environment variables.
//!
//! - [`SyncConfig`] - incremental database sync settings
//! - [`ExportConfig`] - flat-file export settings
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//! use tgexport::config::{SyncConfig, parse_date};
//!
//! # fn main() -> tgexport::Result<()> {
//! let config = SyncConfig::new()
//!     .with_messages_after(parse_date("2023-01-01")?)
//!     .with_time_budget(Duration::from_secs(540));
//!
//! assert_eq!(config.message_batch_size, 100);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::deadline::Deadline;
use crate::error::{ExportError, Result};

/// Messages buffered before a flush.
pub const DEFAULT_MESSAGE_BATCH: usize = 100;

/// Participants buffered before a flush.
pub const DEFAULT_PARTICIPANT_BATCH: usize = 1000;

/// Settings of an incremental sync run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Lower time bound for messages (default: none)
    pub messages_after: Option<DateTime<Utc>>,

    /// Wall-clock deadline (default: unbounded)
    #[serde(skip)]
    pub deadline: Deadline,

    /// Messages per insert (default: 100)
    pub message_batch_size: usize,

    /// Participants per insert (default: 1000)
    pub participant_batch_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            messages_after: None,
            deadline: Deadline::unbounded(),
            message_batch_size: DEFAULT_MESSAGE_BATCH,
            participant_batch_size: DEFAULT_PARTICIPANT_BATCH,
        }
    }
}

impl SyncConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_messages_after(mut self, after: DateTime<Utc>) -> Self {
        self.messages_after = Some(after);
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Sets the deadline to `budget` from now.
    #[must_use]
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.deadline = Deadline::after(budget);
        self
    }

    /// Sets the message batch size. Zero is treated as one.
    #[must_use]
    pub fn with_message_batch_size(mut self, size: usize) -> Self {
        self.message_batch_size = size.max(1);
        self
    }

    /// Sets the participant batch size. Zero is treated as one.
    #[must_use]
    pub fn with_participant_batch_size(mut self, size: usize) -> Self {
        self.participant_batch_size = size.max(1);
        self
    }
}

/// Settings of a flat-file export.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Root directory; each group gets a subdirectory (default: `./data`)
    pub output_dir: PathBuf,

    /// The newest-first scan stops at the first older message (default: none)
    pub messages_after: Option<DateTime<Utc>>,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./data"),
            messages_after: None,
        }
    }
}

impl ExportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_messages_after(mut self, after: DateTime<Utc>) -> Self {
        self.messages_after = Some(after);
        self
    }
}

/// Parses `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp.
pub fn parse_date(input: &str) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc())
            .ok_or_else(|| ExportError::invalid_date(input));
    }
    DateTime::parse_from_rfc3339(input)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| ExportError::invalid_date(input))
}

/// Parses a duration like `300`, `300s`, `5m` or `1h`.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let s = input.trim();
    if s.is_empty() {
        return Err(ExportError::invalid_config("empty duration"));
    }

    let (digits, unit) = match s.char_indices().last() {
        Some((idx, 'h')) => (&s[..idx], 3600),
        Some((idx, 'm')) => (&s[..idx], 60),
        Some((idx, 's')) => (&s[..idx], 1),
        _ => (s, 1),
    };

    let value: u64 = digits
        .parse()
        .map_err(|_| ExportError::invalid_config(format!("invalid duration '{input}'")))?;
    Ok(Duration::from_secs(value.saturating_mul(unit)))
}
