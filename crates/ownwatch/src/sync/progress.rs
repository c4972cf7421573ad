//! Progress events emitted during a sync run.
//!
//! The engine never prints anything itself; callers that want feedback pass a
//! [`ProgressCallback`] and render the events however they like.

use std::sync::Arc;

use super::types::Direction;

/// Progress events emitted during a sync run.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum SyncProgress {
    /// A run started for a user.
    RunStarted {
        user: String,
        direction: Direction,
    },

    /// Fetched one page of history.
    FetchedPage {
        user: String,
        /// Page number (1-indexed).
        page: u32,
        /// Total pages reported by the API.
        page_count: u32,
        /// Records on this page.
        count: usize,
    },

    /// A record was already published by an earlier run.
    SkippedDuplicate { user: String, record_id: i64 },

    /// A record of an unpublishable kind was skipped.
    SkippedUnsupported {
        user: String,
        record_id: i64,
        kind: String,
    },

    /// A record was published and the watermark persisted.
    Published {
        user: String,
        record_id: i64,
        summary: String,
    },

    /// Publishing a record failed; the run stops here.
    PublishFailed {
        user: String,
        record_id: i64,
        error: String,
    },

    /// The run finished without aborting.
    RunComplete {
        user: String,
        pages: u32,
        published: usize,
        skipped: usize,
    },

    /// A scheduled sweep started.
    SweepStarted {
        /// Users eligible for a run.
        eligible: usize,
        /// Users skipped because a run was already active.
        busy: usize,
    },

    /// A scheduled sweep finished.
    SweepComplete { succeeded: usize, failed: usize },
}

/// Callback for progress updates during a sync run.
///
/// Shared so one reporter can be handed to concurrently spawned runs.
pub type ProgressCallback = Arc<dyn Fn(SyncProgress) + Send + Sync>;

/// Emit a progress event if a callback is provided.
#[inline]
pub fn emit(on_progress: Option<&ProgressCallback>, event: SyncProgress) {
    if let Some(cb) = on_progress {
        cb(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emit_with_callback() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);

        let callback: ProgressCallback = Arc::new(move |_event| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        emit(
            Some(&callback),
            SyncProgress::SkippedDuplicate {
                user: "https://a.example/".into(),
                record_id: 1,
            },
        );
        emit(
            Some(&callback),
            SyncProgress::SweepComplete {
                succeeded: 1,
                failed: 0,
            },
        );

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn emit_without_callback() {
        emit(
            None,
            SyncProgress::RunStarted {
                user: "https://a.example/".into(),
                direction: Direction::Newer,
            },
        );
    }
}
