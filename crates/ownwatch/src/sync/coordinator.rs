//! At most one in-flight run per user.
//!
//! The coordinator is an advisory, in-process lock table. A run holds a
//! [`RunGuard`] for its whole lifetime; dropping the guard clears the flag, so
//! the flag is released on every exit path including panics and cancelled
//! tasks. Directions share one flag: a backfill and a catch-up for the same
//! user never overlap.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::types::{Direction, RunOutcome};

/// Whether a run is in flight for a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running {
        direction: Direction,
        started_at: DateTime<Utc>,
    },
}

impl RunStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, RunStatus::Running { .. })
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveRun {
    generation: u64,
    direction: Direction,
    started_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Entry {
    active: Option<ActiveRun>,
    last_outcome: Option<RunOutcome>,
}

#[derive(Debug, Default)]
struct Table {
    next_generation: u64,
    entries: HashMap<String, Entry>,
}

/// Per-user run flags. Cheap to clone; clones share the table.
#[derive(Debug, Clone, Default)]
pub struct RunCoordinator {
    table: Arc<Mutex<Table>>,
}

impl RunCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        // Entries stay consistent even if a holder panicked: every critical
        // section is a single assignment.
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set the flag for `key` unless it is already set.
    ///
    /// Returns `None` when a run is active; the caller should skip or report
    /// "already running".
    pub fn try_acquire(&self, key: &str, direction: Direction) -> Option<RunGuard> {
        let mut table = self.lock();
        table.next_generation += 1;
        let generation = table.next_generation;

        let entry = table.entries.entry(key.to_string()).or_default();
        if entry.active.is_some() {
            return None;
        }
        entry.active = Some(ActiveRun {
            generation,
            direction,
            started_at: Utc::now(),
        });

        Some(RunGuard {
            table: Arc::clone(&self.table),
            key: key.to_string(),
            generation,
        })
    }

    /// Clear the flag for `key`. Idempotent.
    pub fn release(&self, key: &str) {
        if let Some(entry) = self.lock().entries.get_mut(key) {
            entry.active = None;
        }
    }

    pub fn is_running(&self, key: &str) -> bool {
        self.status(key).is_running()
    }

    pub fn status(&self, key: &str) -> RunStatus {
        match self.lock().entries.get(key).and_then(|e| e.active) {
            Some(active) => RunStatus::Running {
                direction: active.direction,
                started_at: active.started_at,
            },
            None => RunStatus::Idle,
        }
    }

    /// How the most recent finished run for `key` ended.
    pub fn last_outcome(&self, key: &str) -> Option<RunOutcome> {
        self.lock()
            .entries
            .get(key)
            .and_then(|e| e.last_outcome.clone())
    }

    pub fn record_outcome(&self, key: &str, outcome: RunOutcome) {
        self.lock()
            .entries
            .entry(key.to_string())
            .or_default()
            .last_outcome = Some(outcome);
    }
}

/// Holds a user's run flag; releases it on drop.
#[derive(Debug)]
pub struct RunGuard {
    table: Arc<Mutex<Table>>,
    key: String,
    generation: u64,
}

impl RunGuard {
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Record how the run ended, then release the flag.
    pub fn finish(self, outcome: RunOutcome) {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        table.entries.entry(self.key.clone()).or_default().last_outcome = Some(outcome);
        // `self` drops after the table lock is released.
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        let mut table = self.table.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = table.entries.get_mut(&self.key)
            && entry.active.is_some_and(|a| a.generation == self.generation)
        {
            entry.active = None;
        }
    }
}
