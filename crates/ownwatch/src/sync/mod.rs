//! Incremental mirroring of watch history.
//!
//! - [`watermark`] - the already-synced boundary and its update rules
//! - [`engine`] - the fetch/translate/publish/persist loop for one run
//! - [`coordinator`] - one in-flight run per user
//! - [`service`] - starting, resetting and inspecting runs
//! - [`scheduler`] - periodic catch-up sweeps

pub mod coordinator;
pub mod engine;
pub mod progress;
pub mod scheduler;
pub mod service;
pub mod types;
pub mod watermark;

pub use coordinator::{RunCoordinator, RunGuard, RunStatus};
pub use engine::{SyncEngine, SyncError};
pub use progress::{ProgressCallback, SyncProgress, emit};
pub use scheduler::{Scheduler, SweepSummary};
pub use service::{PreparedRun, ServiceError, SyncService, UserStatus};
pub use types::{
    DEFAULT_SCHEDULE_INTERVAL, Direction, RunOutcome, SyncOptions, SyncReport, UnknownKindPolicy,
};
pub use watermark::{NO_RECORD_ID, WatermarkState};
