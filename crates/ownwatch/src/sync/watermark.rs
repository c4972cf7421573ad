//! The "already synced" boundary for a user's history.
//!
//! A watermark records the newest and oldest history records that have been
//! published, by time and by ID. Fetches are bounded by it, and the two
//! boundary IDs are the only de-duplication the engine performs: everything
//! strictly between the boundaries in time was published by an earlier run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::types::Direction;
use crate::trakt::HistoryRecord;

/// ID written by [`WatermarkState::reset`]; never matches a real record.
pub const NO_RECORD_ID: i64 = 0;

/// Newest/oldest synced boundaries.
///
/// Both times are `None` only before the first successful sync. Once both are
/// set, `oldest_seen_time <= newest_seen_time` holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatermarkState {
    newest_seen_time: Option<DateTime<Utc>>,
    newest_seen_id: i64,
    oldest_seen_time: Option<DateTime<Utc>>,
    oldest_seen_id: i64,
}

impl WatermarkState {
    /// Rebuild a watermark from persisted columns.
    pub fn from_parts(
        newest: Option<(DateTime<Utc>, i64)>,
        oldest: Option<(DateTime<Utc>, i64)>,
    ) -> Self {
        Self {
            newest_seen_time: newest.map(|(t, _)| t),
            newest_seen_id: newest.map_or(NO_RECORD_ID, |(_, id)| id),
            oldest_seen_time: oldest.map(|(t, _)| t),
            oldest_seen_id: oldest.map_or(NO_RECORD_ID, |(_, id)| id),
        }
    }

    pub fn newest_seen_time(&self) -> Option<DateTime<Utc>> {
        self.newest_seen_time
    }

    pub fn newest_seen_id(&self) -> i64 {
        self.newest_seen_id
    }

    pub fn oldest_seen_time(&self) -> Option<DateTime<Utc>> {
        self.oldest_seen_time
    }

    pub fn oldest_seen_id(&self) -> i64 {
        self.oldest_seen_id
    }

    /// True before anything has been synced or reset.
    pub fn is_empty(&self) -> bool {
        self.newest_seen_time.is_none() && self.oldest_seen_time.is_none()
    }

    /// Widen the watermark to include a record that was just published.
    ///
    /// The newest boundary only moves forward in time and the oldest only
    /// moves backward; a record strictly inside the window changes nothing.
    #[must_use]
    pub fn advance(self, record: &HistoryRecord) -> Self {
        let mut next = self;

        if next
            .newest_seen_time
            .is_none_or(|newest| record.watched_at > newest)
        {
            next.newest_seen_time = Some(record.watched_at);
            next.newest_seen_id = record.id;
        }

        if next
            .oldest_seen_time
            .is_none_or(|oldest| record.watched_at < oldest)
        {
            next.oldest_seen_time = Some(record.watched_at);
            next.oldest_seen_id = record.id;
        }

        next
    }

    /// Whether `record` is one of the two boundary records already published.
    pub fn is_already_covered(&self, record: &HistoryRecord) -> bool {
        record.id != NO_RECORD_ID
            && (record.id == self.newest_seen_id || record.id == self.oldest_seen_id)
    }

    /// Discard sync history: both boundaries collapse onto `now`.
    ///
    /// After a reset a "newer" run only imports what is watched from `now`
    /// on, and an "older" run walks backwards from `now`.
    #[must_use]
    pub fn reset(now: DateTime<Utc>) -> Self {
        Self {
            newest_seen_time: Some(now),
            newest_seen_id: NO_RECORD_ID,
            oldest_seen_time: Some(now),
            oldest_seen_id: NO_RECORD_ID,
        }
    }

    /// `(start_at, end_at)` bounds for a fetch in `direction`.
    ///
    /// Exactly one side is bounded; `None` means unbounded.
    pub fn query_bounds(
        &self,
        direction: Direction,
    ) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        match direction {
            Direction::Newer => (self.newest_seen_time, None),
            Direction::Older => (None, self.oldest_seen_time),
        }
    }
}
