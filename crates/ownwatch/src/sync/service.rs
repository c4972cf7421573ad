//! Entry point for starting, resetting and inspecting runs.
//!
//! Both the trigger routes and the scheduler go through [`SyncService`]; it
//! owns the [`RunCoordinator`] so that every path honours the per-user flag.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use super::coordinator::{RunCoordinator, RunGuard, RunStatus};
use super::engine::{SyncEngine, SyncError};
use super::progress::ProgressCallback;
use super::types::{Direction, RunOutcome, SyncOptions, SyncReport, UnknownKindPolicy};
use super::watermark::WatermarkState;
use crate::store::StoreError;
use crate::user::User;

/// Why a run could not be started (or, for [`SyncService::run_now`], why it
/// failed).
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("user not found: {0}")]
    NotFound(String),

    #[error("a sync is already running for {0}")]
    AlreadyRunning(String),

    #[error("{0} is missing a credential or a publish endpoint")]
    NotEligible(String),

    #[error("user store error: {0}")]
    Store(#[source] StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(key) => ServiceError::NotFound(key),
            other => ServiceError::Store(other),
        }
    }
}

/// A run that holds its user's flag and is ready to execute.
#[derive(Debug)]
pub struct PreparedRun {
    guard: RunGuard,
    user: User,
    options: SyncOptions,
}

impl PreparedRun {
    pub fn user(&self) -> &User {
        &self.user
    }
}

/// Snapshot returned by [`SyncService::status`].
#[derive(Debug, Clone, Serialize)]
pub struct UserStatus {
    pub profile_url: String,
    pub eligible: bool,
    pub running: bool,
    #[serde(flatten)]
    pub run: RunStatus,
    pub last_outcome: Option<RunOutcome>,
    pub watermark: WatermarkState,
}

struct Inner {
    engine: SyncEngine,
    coordinator: RunCoordinator,
    unknown_kind: UnknownKindPolicy,
    on_progress: Option<ProgressCallback>,
    fatal: CancellationToken,
    background: TaskTracker,
}

/// Shared handle over the engine and the coordinator. Cheap to clone.
#[derive(Clone)]
pub struct SyncService {
    inner: Arc<Inner>,
}

impl SyncService {
    pub fn new(engine: SyncEngine) -> Self {
        Self::with_coordinator(engine, RunCoordinator::new())
    }

    pub fn with_coordinator(engine: SyncEngine, coordinator: RunCoordinator) -> Self {
        Self {
            inner: Arc::new(Inner {
                engine,
                coordinator,
                unknown_kind: UnknownKindPolicy::default(),
                on_progress: None,
                fatal: CancellationToken::new(),
                background: TaskTracker::new(),
            }),
        }
    }

    /// Policy applied to every run started through this service.
    ///
    /// Must be called before the service is cloned.
    #[must_use]
    pub fn with_unknown_kind(self, policy: UnknownKindPolicy) -> Self {
        self.map_inner(|inner| inner.unknown_kind = policy)
    }

    #[must_use]
    pub fn with_progress(self, on_progress: ProgressCallback) -> Self {
        self.map_inner(|inner| inner.on_progress = Some(on_progress))
    }

    fn map_inner(self, f: impl FnOnce(&mut Inner)) -> Self {
        match Arc::try_unwrap(self.inner) {
            Ok(mut inner) => {
                f(&mut inner);
                Self {
                    inner: Arc::new(inner),
                }
            }
            Err(shared) => {
                tracing::warn!("SyncService already shared; configuration change ignored");
                Self { inner: shared }
            }
        }
    }

    pub fn coordinator(&self) -> &RunCoordinator {
        &self.inner.coordinator
    }

    pub fn progress(&self) -> Option<ProgressCallback> {
        self.inner.on_progress.clone()
    }

    /// Cancelled when a run hits a fatal (persistence) error.
    pub fn fatal_token(&self) -> CancellationToken {
        self.inner.fatal.clone()
    }

    pub fn has_failed_fatally(&self) -> bool {
        self.inner.fatal.is_cancelled()
    }

    fn options(&self, direction: Direction, continue_paging: bool) -> SyncOptions {
        SyncOptions {
            direction,
            continue_paging,
            unknown_kind: self.inner.unknown_kind,
        }
    }

    /// Take the user's flag and load the user.
    ///
    /// The flag is taken before the load so the watermark read is not stale
    /// relative to a run that is just finishing.
    pub async fn prepare(
        &self,
        key: &str,
        direction: Direction,
        continue_paging: bool,
    ) -> Result<PreparedRun, ServiceError> {
        let guard = self
            .inner
            .coordinator
            .try_acquire(key, direction)
            .ok_or_else(|| ServiceError::AlreadyRunning(key.to_string()))?;

        let user = self.inner.engine.store().get(key).await?;
        if !user.is_eligible() {
            return Err(ServiceError::NotEligible(key.to_string()));
        }

        Ok(PreparedRun {
            guard,
            user,
            options: self.options(direction, continue_paging),
        })
    }

    /// Execute a prepared run, record its outcome and release the flag.
    pub async fn execute(&self, run: PreparedRun) -> Result<SyncReport, SyncError> {
        let PreparedRun {
            guard,
            mut user,
            options,
        } = run;

        let result = self
            .inner
            .engine
            .run(&mut user, options, self.inner.on_progress.as_ref())
            .await;

        let finished_at = Utc::now();
        let outcome = match &result {
            Ok(report) => RunOutcome::Completed {
                direction: options.direction,
                finished_at,
                report: report.clone(),
            },
            Err(e) => {
                if e.is_fatal() {
                    tracing::error!(user = %user.key(), error = %e, "Fatal sync error, shutting down");
                    self.inner.fatal.cancel();
                } else {
                    tracing::warn!(user = %user.key(), error = %e, "Sync aborted");
                }
                RunOutcome::Failed {
                    direction: options.direction,
                    finished_at,
                    error: e.to_string(),
                }
            }
        };
        guard.finish(outcome);

        result
    }

    /// Start a run in the background.
    ///
    /// Returns once the run has been accepted; the handle resolves when it
    /// finishes.
    pub async fn trigger(
        &self,
        key: &str,
        direction: Direction,
        continue_paging: bool,
    ) -> Result<JoinHandle<Result<SyncReport, SyncError>>, ServiceError> {
        let run = self.prepare(key, direction, continue_paging).await?;
        let service = self.clone();
        Ok(self
            .inner
            .background
            .spawn(async move { service.execute(run).await }))
    }

    /// Wait for every run started by [`trigger`](Self::trigger) to finish.
    ///
    /// Runs are never interrupted; in-flight requests end on their own
    /// timeouts.
    pub async fn drain(&self) {
        self.inner.background.close();
        self.inner.background.wait().await;
        self.inner.background.reopen();
    }

    /// Run to completion in the caller's task.
    pub async fn run_now(
        &self,
        key: &str,
        direction: Direction,
        continue_paging: bool,
    ) -> Result<SyncReport, ServiceError> {
        let run = self.prepare(key, direction, continue_paging).await?;
        Ok(self.execute(run).await?)
    }

    /// Discard the user's sync history; both boundaries move to now.
    ///
    /// Refused while a run is active.
    pub async fn reset(&self, key: &str) -> Result<WatermarkState, ServiceError> {
        let _guard = self
            .inner
            .coordinator
            .try_acquire(key, Direction::Newer)
            .ok_or_else(|| ServiceError::AlreadyRunning(key.to_string()))?;

        let store = self.inner.engine.store();
        let mut user = store.get(key).await?;
        user.watermark = WatermarkState::reset(Utc::now());
        store.save(&user).await?;

        tracing::info!(user = %key, "Watermark reset");
        Ok(user.watermark)
    }

    pub async fn status(&self, key: &str) -> Result<UserStatus, ServiceError> {
        let user = self.inner.engine.store().get(key).await?;
        let run = self.inner.coordinator.status(key);

        Ok(UserStatus {
            eligible: user.is_eligible(),
            running: run.is_running(),
            run,
            last_outcome: self.inner.coordinator.last_outcome(key),
            watermark: user.watermark,
            profile_url: user.profile_url,
        })
    }

    pub async fn users(&self) -> Result<Vec<User>, ServiceError> {
        Ok(self.inner.engine.store().get_all().await?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::micropub::{PublishError, Publisher, WatchEvent};
    use crate::store::{MemoryUserStore, UserStore};
    use crate::trakt::{
        FetchError, HistoryPage, HistoryRecord, HistorySource, Media, MediaIds, Movie, PageInfo,
        PageQuery,
    };
    use crate::user::AccessToken;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone};
    use std::sync::Mutex;
    use tokio::sync::Notify;

    pub(crate) fn eligible_user(key: &str) -> User {
        let mut user = User::new(key);
        user.publish_endpoint = Some(format!("{key}micropub"));
        user.history_token = Some(AccessToken::bearer("trakt"));
        user.publish_token = Some(AccessToken::bearer("site"));
        user
    }

    pub(crate) fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 4, 1, 8, minute, 0).unwrap()
    }

    pub(crate) fn movie(id: i64, minute: u32) -> HistoryRecord {
        HistoryRecord {
            id,
            watched_at: at(minute),
            action: "watch".into(),
            media: Media::Movie(Movie {
                title: format!("Movie {id}"),
                year: None,
                ids: MediaIds::default(),
            }),
        }
    }

    /// Returns the same single page for every query. When `gate` is set,
    /// each fetch waits for a notification first.
    #[derive(Default)]
    pub(crate) struct StaticSource {
        pub records: Vec<HistoryRecord>,
        pub gate: Option<Arc<Notify>>,
        pub fetches: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HistorySource for StaticSource {
        async fn fetch_page(&self, user: &User, query: &PageQuery) -> Result<HistoryPage, FetchError> {
            self.fetches.lock().unwrap().push(user.key().to_string());
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            Ok(HistoryPage {
                records: self.records.clone(),
                info: PageInfo {
                    page: query.page,
                    page_count: 1,
                },
            })
        }
    }

    /// Accepts every event except those for users listed in `reject`.
    #[derive(Default)]
    pub(crate) struct RecordingPublisher {
        pub published: Mutex<Vec<(String, i64)>>,
        pub reject: Vec<String>,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(&self, user: &User, event: &WatchEvent) -> Result<(), PublishError> {
            if self.reject.iter().any(|key| key == user.key()) {
                return Err(PublishError::Rejected {
                    status: 400,
                    body: "invalid_request".into(),
                });
            }
            self.published
                .lock()
                .unwrap()
                .push((user.key().to_string(), event.source_id));
            Ok(())
        }
    }

    pub(crate) fn service_with(
        source: Arc<StaticSource>,
        publisher: Arc<RecordingPublisher>,
        store: Arc<MemoryUserStore>,
    ) -> SyncService {
        SyncService::new(SyncEngine::new(source, publisher, store))
    }

    const ALICE: &str = "https://alice.example/";

    #[tokio::test]
    async fn run_now_publishes_and_records_outcome() {
        let store = Arc::new(MemoryUserStore::with_users([eligible_user(ALICE)]));
        let source = Arc::new(StaticSource {
            records: vec![movie(1, 1)],
            ..StaticSource::default()
        });
        let publisher = Arc::new(RecordingPublisher::default());
        let service = service_with(source, publisher.clone(), store.clone());

        let report = service
            .run_now(ALICE, Direction::Newer, false)
            .await
            .expect("run");

        assert_eq!(report.published, 1);
        assert_eq!(
            *publisher.published.lock().unwrap(),
            vec![(ALICE.to_string(), 1)]
        );
        assert_eq!(store.get(ALICE).await.unwrap().watermark.newest_seen_id(), 1);

        let status = service.status(ALICE).await.expect("status");
        assert!(!status.running);
        assert!(matches!(
            status.last_outcome,
            Some(RunOutcome::Completed { direction: Direction::Newer, .. })
        ));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let service = service_with(
            Arc::new(StaticSource::default()),
            Arc::new(RecordingPublisher::default()),
            Arc::new(MemoryUserStore::new()),
        );

        let err = service
            .trigger(ALICE, Direction::Newer, false)
            .await
            .expect_err("unknown");
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(!service.coordinator().is_running(ALICE));
    }

    #[tokio::test]
    async fn user_without_credentials_is_not_eligible() {
        let store = Arc::new(MemoryUserStore::with_users([User::new(ALICE)]));
        let service = service_with(
            Arc::new(StaticSource::default()),
            Arc::new(RecordingPublisher::default()),
            store,
        );

        let err = service
            .run_now(ALICE, Direction::Older, true)
            .await
            .expect_err("no credentials");
        assert!(matches!(err, ServiceError::NotEligible(_)));
        assert!(!service.coordinator().is_running(ALICE));
    }

    #[tokio::test]
    async fn second_trigger_conflicts_while_first_is_running() {
        let gate = Arc::new(Notify::new());
        let store = Arc::new(MemoryUserStore::with_users([eligible_user(ALICE)]));
        let source = Arc::new(StaticSource {
            records: vec![movie(1, 1)],
            gate: Some(gate.clone()),
            ..StaticSource::default()
        });
        let publisher = Arc::new(RecordingPublisher::default());
        let service = service_with(source, publisher.clone(), store);

        let handle = service
            .trigger(ALICE, Direction::Newer, false)
            .await
            .expect("first accepted");

        let err = service
            .trigger(ALICE, Direction::Older, true)
            .await
            .expect_err("second rejected");
        assert!(matches!(err, ServiceError::AlreadyRunning(_)));
        assert!(matches!(
            service.reset(ALICE).await,
            Err(ServiceError::AlreadyRunning(_))
        ));
        assert!(service.status(ALICE).await.expect("status").running);

        gate.notify_one();
        handle.await.expect("join").expect("run");
        service.drain().await;

        assert!(!service.coordinator().is_running(ALICE));
        assert_eq!(publisher.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn drain_waits_for_background_runs() {
        let gate = Arc::new(Notify::new());
        let store = Arc::new(MemoryUserStore::with_users([eligible_user(ALICE)]));
        let source = Arc::new(StaticSource {
            records: vec![movie(3, 3)],
            gate: Some(gate.clone()),
            ..StaticSource::default()
        });
        let publisher = Arc::new(RecordingPublisher::default());
        let service = service_with(source, publisher.clone(), store);

        let _handle = service
            .trigger(ALICE, Direction::Newer, false)
            .await
            .expect("accepted");

        let drained = tokio::spawn({
            let service = service.clone();
            async move { service.drain().await }
        });
        tokio::task::yield_now().await;
        assert!(!drained.is_finished());

        gate.notify_one();
        tokio::time::timeout(std::time::Duration::from_secs(5), drained)
            .await
            .expect("drain finishes")
            .expect("join");
        assert_eq!(publisher.published.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reset_moves_both_boundaries_to_now() {
        let mut user = eligible_user(ALICE);
        user.watermark = WatermarkState::from_parts(Some((at(30), 9)), Some((at(1), 2)));
        let store = Arc::new(MemoryUserStore::with_users([user]));
        let service = service_with(
            Arc::new(StaticSource::default()),
            Arc::new(RecordingPublisher::default()),
            store.clone(),
        );

        let before = Utc::now();
        let watermark = service.reset(ALICE).await.expect("reset");

        assert_eq!(watermark.newest_seen_id(), 0);
        assert_eq!(watermark.oldest_seen_id(), 0);
        assert!(watermark.newest_seen_time().is_some_and(|t| t >= before));
        assert_eq!(watermark.newest_seen_time(), watermark.oldest_seen_time());
        assert_eq!(store.get(ALICE).await.unwrap().watermark, watermark);
    }

    struct SaveFails(MemoryUserStore);

    #[async_trait]
    impl UserStore for SaveFails {
        async fn get(&self, key: &str) -> crate::store::Result<User> {
            self.0.get(key).await
        }
        async fn save(&self, _user: &User) -> crate::store::Result<()> {
            Err(StoreError::Unavailable("read-only".into()))
        }
        async fn get_all(&self) -> crate::store::Result<Vec<User>> {
            self.0.get_all().await
        }
    }

    #[tokio::test]
    async fn persistence_failure_cancels_fatal_token() {
        let store = Arc::new(SaveFails(MemoryUserStore::with_users([eligible_user(ALICE)])));
        let source = Arc::new(StaticSource {
            records: vec![movie(1, 1)],
            ..StaticSource::default()
        });
        let service = SyncService::new(SyncEngine::new(
            source,
            Arc::new(RecordingPublisher::default()),
            store,
        ));
        let fatal = service.fatal_token();

        let err = service
            .run_now(ALICE, Direction::Newer, false)
            .await
            .expect_err("fatal");

        assert!(matches!(err, ServiceError::Sync(ref e) if e.is_fatal()));
        assert!(fatal.is_cancelled());
        assert!(service.has_failed_fatally());
        assert!(!service.coordinator().is_running(ALICE));
        assert!(matches!(
            service.coordinator().last_outcome(ALICE),
            Some(RunOutcome::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn status_serializes_run_state_flat() {
        let store = Arc::new(MemoryUserStore::with_users([eligible_user(ALICE)]));
        let service = service_with(
            Arc::new(StaticSource::default()),
            Arc::new(RecordingPublisher::default()),
            store,
        );

        let json = serde_json::to_value(service.status(ALICE).await.expect("status")).expect("json");
        assert_eq!(json["running"], false);
        assert_eq!(json["state"], "idle");
        assert_eq!(json["eligible"], true);
        assert!(json["last_outcome"].is_null());
    }

    #[tokio::test]
    async fn configuration_applies_before_sharing() {
        let service = service_with(
            Arc::new(StaticSource::default()),
            Arc::new(RecordingPublisher::default()),
            Arc::new(MemoryUserStore::new()),
        )
        .with_unknown_kind(UnknownKindPolicy::Skip);

        assert_eq!(
            service.options(Direction::Newer, false).unknown_kind,
            UnknownKindPolicy::Skip
        );
    }
}
