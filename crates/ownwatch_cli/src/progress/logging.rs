use ownwatch::sync::SyncProgress;

/// Logging reporter using tracing for structured output.
pub struct LoggingReporter;

impl LoggingReporter {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: SyncProgress) {
        match event {
            SyncProgress::RunStarted { user, direction } => {
                tracing::info!(user = %user, direction = %direction, "Sync started");
            }

            SyncProgress::FetchedPage {
                user,
                page,
                page_count,
                count,
            } => {
                tracing::debug!(user = %user, page, page_count, count, "Fetched page");
            }

            SyncProgress::SkippedDuplicate { user, record_id } => {
                tracing::debug!(user = %user, record_id, "Already published");
            }

            SyncProgress::SkippedUnsupported {
                user,
                record_id,
                kind,
            } => {
                tracing::warn!(user = %user, record_id, kind = %kind, "Skipped unsupported record");
            }

            SyncProgress::Published {
                user,
                record_id,
                summary,
            } => {
                tracing::info!(user = %user, record_id, "{}", summary);
            }

            SyncProgress::PublishFailed {
                user,
                record_id,
                error,
            } => {
                tracing::warn!(user = %user, record_id, error = %error, "Publish failed");
            }

            SyncProgress::RunComplete {
                user,
                pages,
                published,
                skipped,
            } => {
                tracing::info!(user = %user, pages, published, skipped, "Sync complete");
            }

            SyncProgress::SweepStarted { eligible, busy } => {
                tracing::info!(eligible, busy, "Sweep started");
            }

            SyncProgress::SweepComplete { succeeded, failed } => {
                tracing::info!(succeeded, failed, "Sweep complete");
            }

            _ => {}
        }
    }
}

impl Default for LoggingReporter {
    fn default() -> Self {
        Self::new()
    }
}
