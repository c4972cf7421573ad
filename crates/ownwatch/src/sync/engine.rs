//! The incremental sync loop for one user and one direction.
//!
//! A run walks pages of history inside the window bounded by the watermark,
//! publishes every record not already covered, and persists the user after
//! each successful publish. A crash mid-run therefore loses at most the
//! in-flight record.
//!
//! # Example
//!
//! ```ignore
//! use ownwatch::sync::{SyncEngine, SyncOptions};
//!
//! let engine = SyncEngine::new(source, publisher, store);
//! let report = engine.run(&mut user, SyncOptions::older_backfill(), None).await?;
//! println!("published {} records", report.published);
//! ```

use std::sync::Arc;

use thiserror::Error;

use super::progress::{ProgressCallback, SyncProgress, emit};
use super::types::{SyncOptions, SyncReport, UnknownKindPolicy};
use crate::micropub::{Publisher, UnsupportedRecordKind, translate};
use crate::store::{StoreError, UserStore};
use crate::trakt::{FetchError, HistorySource, PageQuery};
use crate::user::User;

/// Why a run was aborted.
///
/// A publish failure is not an abort: it ends the run early and is reported
/// through [`SyncReport::publish_error`].
#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("history record {record_id}: {source}")]
    UnsupportedKind {
        record_id: i64,
        #[source]
        source: UnsupportedRecordKind,
    },

    /// The record was published but the advanced watermark was not saved.
    /// The next run will publish it again.
    #[error("could not save {user} after publishing record {record_id}: {source}")]
    Persistence {
        user: String,
        record_id: i64,
        #[source]
        source: StoreError,
    },
}

impl SyncError {
    /// Persistence failures leave remote and local state out of step and must
    /// stop the process rather than be retried on the next tick.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SyncError::Persistence { .. })
    }
}

/// Fetch → translate → publish → advance → persist.
#[derive(Clone)]
pub struct SyncEngine {
    source: Arc<dyn HistorySource>,
    publisher: Arc<dyn Publisher>,
    store: Arc<dyn UserStore>,
}

impl SyncEngine {
    pub fn new(
        source: Arc<dyn HistorySource>,
        publisher: Arc<dyn Publisher>,
        store: Arc<dyn UserStore>,
    ) -> Self {
        Self {
            source,
            publisher,
            store,
        }
    }

    pub fn store(&self) -> &Arc<dyn UserStore> {
        &self.store
    }

    /// Run one sync for `user` in `options.direction`.
    ///
    /// The fetch window is taken from the watermark as it stands when the run
    /// starts, so page numbers stay meaningful while the watermark moves.
    /// A record is skipped when its ID matches a boundary of either the
    /// starting or the live watermark: pages come newest first, so the old
    /// boundary record can follow a record that already moved the live one.
    ///
    /// `user.watermark` is updated in place as records are published.
    #[tracing::instrument(
        skip(self, user, options, on_progress),
        fields(user = %user.key(), direction = %options.direction)
    )]
    pub async fn run(
        &self,
        user: &mut User,
        options: SyncOptions,
        on_progress: Option<&ProgressCallback>,
    ) -> Result<SyncReport, SyncError> {
        let key = user.key().to_string();
        let starting = user.watermark;
        let (start_at, end_at) = starting.query_bounds(options.direction);
        let mut report = SyncReport::default();
        let mut page = 1;

        tracing::info!(?start_at, ?end_at, continue_paging = options.continue_paging, "Sync started");
        emit(
            on_progress,
            SyncProgress::RunStarted {
                user: key.clone(),
                direction: options.direction,
            },
        );

        loop {
            let query = PageQuery {
                page,
                start_at,
                end_at,
            };
            let fetched = self.source.fetch_page(user, &query).await.inspect_err(|e| {
                tracing::warn!(page, error = %e, "Could not fetch history");
            })?;
            report.pages_fetched += 1;

            emit(
                on_progress,
                SyncProgress::FetchedPage {
                    user: key.clone(),
                    page: fetched.info.page,
                    page_count: fetched.info.page_count,
                    count: fetched.records.len(),
                },
            );

            for record in &fetched.records {
                if starting.is_already_covered(record) || user.watermark.is_already_covered(record) {
                    tracing::debug!(record_id = record.id, "Skipping already published record");
                    report.skipped += 1;
                    emit(
                        on_progress,
                        SyncProgress::SkippedDuplicate {
                            user: key.clone(),
                            record_id: record.id,
                        },
                    );
                    continue;
                }

                let event = match translate(record) {
                    Ok(event) => event,
                    Err(unsupported) if options.unknown_kind == UnknownKindPolicy::Skip => {
                        tracing::warn!(record_id = record.id, kind = %unsupported.0, "Skipping unsupported record");
                        report.skipped += 1;
                        emit(
                            on_progress,
                            SyncProgress::SkippedUnsupported {
                                user: key.clone(),
                                record_id: record.id,
                                kind: unsupported.0,
                            },
                        );
                        continue;
                    }
                    Err(unsupported) => {
                        tracing::warn!(record_id = record.id, kind = %unsupported.0, "Aborting on unsupported record");
                        return Err(SyncError::UnsupportedKind {
                            record_id: record.id,
                            source: unsupported,
                        });
                    }
                };

                if let Err(e) = self.publisher.publish(user, &event).await {
                    // Leave the rest for a later run; the watermark has not
                    // moved past this record.
                    tracing::warn!(record_id = record.id, error = %e, "Could not publish, stopping run");
                    emit(
                        on_progress,
                        SyncProgress::PublishFailed {
                            user: key.clone(),
                            record_id: record.id,
                            error: e.to_string(),
                        },
                    );
                    report.publish_error = Some(e.to_string());
                    break;
                }

                user.watermark = user.watermark.advance(record);
                if let Err(source) = self.store.save(user).await {
                    tracing::error!(record_id = record.id, error = %source, "Could not persist watermark");
                    return Err(SyncError::Persistence {
                        user: key,
                        record_id: record.id,
                        source,
                    });
                }

                report.published += 1;
                tracing::debug!(record_id = record.id, summary = %event.summary, "Published");
                emit(
                    on_progress,
                    SyncProgress::Published {
                        user: key.clone(),
                        record_id: record.id,
                        summary: event.summary,
                    },
                );
            }

            if fetched.has_more_pages() && options.continue_paging && report.is_complete() {
                page += 1;
            } else {
                break;
            }
        }

        tracing::info!(
            pages = report.pages_fetched,
            published = report.published,
            skipped = report.skipped,
            publish_failed = !report.is_complete(),
            "Sync finished"
        );
        emit(
            on_progress,
            SyncProgress::RunComplete {
                user: key,
                pages: report.pages_fetched,
                published: report.published,
                skipped: report.skipped,
            },
        );

        Ok(report)
    }
}
