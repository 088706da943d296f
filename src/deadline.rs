//! Wall-clock budget for a sync run.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// A point in time after which streams stop being consumed.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tgexport::deadline::Deadline;
///
/// assert!(!Deadline::unbounded().is_exceeded());
/// assert!(!Deadline::after(Duration::from_secs(600)).is_exceeded());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Deadline {
    at: Option<DateTime<Utc>>,
}

impl Deadline {
    /// A deadline that never passes.
    pub fn unbounded() -> Self {
        Self { at: None }
    }

    pub fn at(at: DateTime<Utc>) -> Self {
        Self { at: Some(at) }
    }

    /// A deadline `budget` from now. Budgets too large to represent never pass.
    pub fn after(budget: Duration) -> Self {
        let at = TimeDelta::from_std(budget)
            .ok()
            .and_then(|delta| Utc::now().checked_add_signed(delta));
        Self { at }
    }

    pub fn instant(&self) -> Option<DateTime<Utc>> {
        self.at
    }

    pub fn is_exceeded(&self) -> bool {
        self.at.is_some_and(|at| Utc::now() > at)
    }
}
