//! Durable user records.
//!
//! The sync engine only needs three operations, captured by [`UserStore`]:
//! load one user, save one user, and list everyone for scheduled sweeps.
//! [`DbUserStore`] is the SQL implementation; [`MemoryUserStore`] keeps
//! everything in a map and is what the tests run against.

mod db;
mod memory;

use async_trait::async_trait;
use thiserror::Error;

use crate::user::User;

pub use db::DbUserStore;
pub use memory::MemoryUserStore;

/// Errors from the user store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// A stored credential blob could not be (de)serialized.
    #[error("invalid stored credential: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Key/value persistence for users, keyed by profile URL.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Load one user; [`StoreError::NotFound`] when the key is unknown.
    async fn get(&self, key: &str) -> Result<User>;

    /// Insert or replace the record for `user.profile_url`.
    async fn save(&self, user: &User) -> Result<()>;

    /// Every stored user, ordered by key.
    async fn get_all(&self) -> Result<Vec<User>>;
}
