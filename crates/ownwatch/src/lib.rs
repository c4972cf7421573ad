//! ownwatch - mirror Trakt watch history to a Micropub endpoint.
//!
//! Each user's history is copied to their site exactly once per record,
//! resuming across runs from a persisted watermark. New watches are picked up
//! by a periodic sweep; older history is backfilled on request.
//!
//! # Features
//!
//! - `sqlite` (default) / `postgres` - database backend for [`store::DbUserStore`]
//! - `migrate` (default) - schema migrations and [`connect_and_migrate`]
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ownwatch::{
//!     DbUserStore, Direction, MicropubClient, StoredCredentials, SyncEngine, SyncService,
//!     TraktClient,
//!     connect_and_migrate,
//! };
//!
//! let db = connect_and_migrate("sqlite://ownwatch.db?mode=rwc").await?;
//! let tokens = Arc::new(StoredCredentials);
//! let engine = SyncEngine::new(
//!     Arc::new(TraktClient::new("client-id", tokens.clone())?),
//!     Arc::new(MicropubClient::new(tokens)?),
//!     Arc::new(DbUserStore::new(db)),
//! );
//! let service = SyncService::new(engine);
//! service.trigger("https://example.com/", Direction::Older, true).await?;
//! ```

pub mod auth;
pub mod db;
pub mod entity;
pub mod http;
pub mod micropub;
pub mod retry;
pub mod store;
pub mod sync;
pub mod trakt;
pub mod user;

#[cfg(feature = "migrate")]
pub mod migration;

pub use auth::{CredentialError, Service, StoredCredentials, TokenProvider};
pub use db::connect;
#[cfg(feature = "migrate")]
pub use db::connect_and_migrate;
pub use micropub::{MicropubClient, PublishError, Publisher, WatchEvent, translate};
pub use store::{DbUserStore, MemoryUserStore, StoreError, UserStore};
pub use sync::{
    Direction, Scheduler, ServiceError, SyncEngine, SyncError, SyncOptions, SyncReport,
    SyncService, UnknownKindPolicy, WatermarkState,
};
pub use trakt::{FetchError, HistoryRecord, HistorySource, TraktClient};
pub use user::{AccessToken, User};
