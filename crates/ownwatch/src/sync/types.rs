//! Shared sync types and constants.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default pause between scheduled sweeps.
pub const DEFAULT_SCHEDULE_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Which side of the watermark a run extends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Records watched after the newest published one.
    Newer,
    /// Records watched before the oldest published one (backfill).
    Older,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Newer => "newer",
            Direction::Older => "older",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What to do with a history record the translator cannot publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownKindPolicy {
    /// Abort the run. The same record aborts every later run too.
    #[default]
    Abort,
    /// Log it and move on without advancing the watermark.
    Skip,
}

impl FromStr for UnknownKindPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "abort" => Ok(Self::Abort),
            "skip" => Ok(Self::Skip),
            other => Err(format!("unknown policy '{other}', expected 'abort' or 'skip'")),
        }
    }
}

/// Options for one sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    pub direction: Direction,
    /// Follow `has_more_pages` past the first page.
    pub continue_paging: bool,
    pub unknown_kind: UnknownKindPolicy,
}

impl SyncOptions {
    /// Scheduled catch-up: newer records, first page only.
    pub fn newer_catch_up() -> Self {
        Self {
            direction: Direction::Newer,
            continue_paging: false,
            unknown_kind: UnknownKindPolicy::default(),
        }
    }

    /// Interactive backfill: older records, every page.
    pub fn older_backfill() -> Self {
        Self {
            direction: Direction::Older,
            continue_paging: true,
            unknown_kind: UnknownKindPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_continue_paging(mut self, continue_paging: bool) -> Self {
        self.continue_paging = continue_paging;
        self
    }

    #[must_use]
    pub fn with_unknown_kind(mut self, policy: UnknownKindPolicy) -> Self {
        self.unknown_kind = policy;
        self
    }
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self::newer_catch_up()
    }
}

/// Result of a sync run that did not abort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Pages fetched from the history API.
    pub pages_fetched: u32,
    /// Records published (and persisted).
    pub published: usize,
    /// Records skipped: boundary duplicates and, under the skip policy,
    /// unsupported kinds.
    pub skipped: usize,
    /// Set when a publish failed and stopped the run early (non-fatal).
    pub publish_error: Option<String>,
}

impl SyncReport {
    /// True when every fetched record was handled.
    pub fn is_complete(&self) -> bool {
        self.publish_error.is_none()
    }
}

/// How the most recent finished run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Completed {
        direction: Direction,
        finished_at: DateTime<Utc>,
        report: SyncReport,
    },
    Failed {
        direction: Direction,
        finished_at: DateTime<Utc>,
        error: String,
    },
}

impl RunOutcome {
    pub fn finished_at(&self) -> DateTime<Utc> {
        match self {
            RunOutcome::Completed { finished_at, .. } | RunOutcome::Failed { finished_at, .. } => {
                *finished_at
            }
        }
    }
}
