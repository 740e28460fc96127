//! Incremental-sync cutoff.
//!
//! Extensions skip releases older than the cutoff. The core never enforces it;
//! it only clamps the persisted value on load and advances it after a run.

use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum age of the cutoff, in days, when it is loaded.
///
/// Bounds the backlog fetched after a long absence.
pub const MAX_BACKLOG_DAYS: i64 = 6;

/// The "fetch since" date shared with extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CutoffDate(NaiveDate);

impl CutoffDate {
    /// Load the cutoff from its persisted value, relative to today's local date.
    #[must_use]
    pub fn load(persisted: Option<NaiveDate>) -> Self {
        Self::load_relative(persisted, today())
    }

    /// Load the cutoff relative to an explicit `today`.
    ///
    /// The result is never earlier than `today - MAX_BACKLOG_DAYS`. A missing
    /// value loads as that lower bound.
    #[must_use]
    pub fn load_relative(persisted: Option<NaiveDate>, today: NaiveDate) -> Self {
        let floor = today - Duration::days(MAX_BACKLOG_DAYS);
        let date = persisted.map_or(floor, |date| date.max(floor));
        Self(date)
    }

    /// Wrap a date without clamping.
    #[must_use]
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// The cutoff date.
    #[must_use]
    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// Move the cutoff to `today`.
    pub fn advance_to(&mut self, today: NaiveDate) {
        self.0 = today;
    }

    /// Move the cutoff to the current local date.
    pub fn advance(&mut self) {
        self.advance_to(today());
    }

    /// Whether a release dated `date` falls before the cutoff and is excluded.
    #[must_use]
    pub fn excludes(&self, date: NaiveDate) -> bool {
        date < self.0
    }
}

impl fmt::Display for CutoffDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Today's date in the local timezone.
#[must_use]
pub fn today() -> NaiveDate {
    Local::now().date_naive()
}
