//! Periodic catch-up sweeps.
//!
//! Every tick, each eligible user gets a single-page "newer" run. Backfills
//! are never scheduled; they only start from an explicit trigger.

use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::engine::SyncError;
use super::progress::{SyncProgress, emit};
use super::service::{ServiceError, SyncService};
use super::types::{DEFAULT_SCHEDULE_INTERVAL, Direction, SyncReport};

/// Counts for one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    /// Runs started.
    pub started: usize,
    /// Users skipped because a run was already active.
    pub busy: usize,
    /// Users skipped for missing credentials or endpoint.
    pub ineligible: usize,
    pub succeeded: usize,
    /// Runs that aborted or stopped on a rejected publish.
    pub failed: usize,
}

/// Drives [`SyncService`] on a fixed interval.
#[derive(Clone)]
pub struct Scheduler {
    service: SyncService,
    interval: Duration,
}

impl Scheduler {
    pub fn new(service: SyncService) -> Self {
        Self {
            service,
            interval: DEFAULT_SCHEDULE_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Sweep now, then once per interval, until `cancel` fires or a run fails
    /// fatally.
    ///
    /// Cancellation is only observed between sweeps; a sweep in progress
    /// always finishes so in-flight publishes are not cut off.
    pub async fn run(&self, cancel: CancellationToken) {
        let fatal = self.service.fatal_token();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(interval = ?self.interval, "Scheduler started");

        loop {
            tokio::select! {
                biased;

                _ = cancel.cancelled() => {
                    tracing::info!("Scheduler stopping");
                    break;
                }
                _ = fatal.cancelled() => {
                    tracing::error!("Scheduler stopping after a fatal sync error");
                    break;
                }
                _ = ticker.tick() => {}
            }

            let summary = self.sweep().await;
            tracing::info!(
                started = summary.started,
                busy = summary.busy,
                ineligible = summary.ineligible,
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Sweep complete"
            );
        }
    }

    /// One pass over every stored user. Waits for all runs it started.
    pub async fn sweep(&self) -> SweepSummary {
        let mut summary = SweepSummary::default();

        let users = match self.service.users().await {
            Ok(users) => users,
            Err(e) => {
                tracing::warn!(error = %e, "Could not list users, skipping sweep");
                return summary;
            }
        };

        let mut runs: JoinSet<Result<SyncReport, SyncError>> = JoinSet::new();

        for user in users {
            if !user.is_eligible() {
                tracing::debug!(user = %user.key(), "Skipping user without credentials");
                summary.ineligible += 1;
                continue;
            }

            match self.service.prepare(user.key(), Direction::Newer, false).await {
                Ok(run) => {
                    let service = self.service.clone();
                    runs.spawn(async move { service.execute(run).await });
                    summary.started += 1;
                }
                Err(ServiceError::AlreadyRunning(key)) => {
                    tracing::debug!(user = %key, "Run already active, skipping");
                    summary.busy += 1;
                }
                Err(ServiceError::NotEligible(_)) => summary.ineligible += 1,
                Err(e) => {
                    tracing::warn!(user = %user.key(), error = %e, "Could not start run");
                    summary.failed += 1;
                }
            }
        }

        let progress = self.service.progress();
        emit(
            progress.as_ref(),
            SyncProgress::SweepStarted {
                eligible: summary.started,
                busy: summary.busy,
            },
        );

        while let Some(joined) = runs.join_next().await {
            match joined {
                Ok(Ok(report)) if report.is_complete() => summary.succeeded += 1,
                // Stopped on a rejected publish; the error was logged by the engine.
                Ok(Ok(_)) => summary.failed += 1,
                Ok(Err(_)) => summary.failed += 1,
                Err(e) => {
                    tracing::error!(error = %e, "Sync task panicked");
                    summary.failed += 1;
                }
            }
        }

        emit(
            progress.as_ref(),
            SyncProgress::SweepComplete {
                succeeded: summary.succeeded,
                failed: summary.failed,
            },
        );

        summary
    }
}
