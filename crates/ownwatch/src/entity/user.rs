//! User entity - one row per mirrored profile.
//!
//! Credentials are stored as opaque JSON blobs; the four watermark columns
//! mirror [`crate::sync::WatermarkState`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Profile URL, the user's identity.
    #[sea_orm(primary_key, auto_increment = false)]
    pub profile_url: String,

    /// Micropub endpoint discovered for the profile.
    pub publish_endpoint: Option<String>,

    /// Trakt OAuth token.
    #[sea_orm(column_type = "Json", nullable)]
    pub history_token: Option<Json>,

    /// Micropub (IndieAuth) token.
    #[sea_orm(column_type = "Json", nullable)]
    pub publish_token: Option<Json>,

    /// `watched_at` of the newest published record.
    pub newest_seen_at: Option<DateTimeWithTimeZone>,

    /// Trakt history ID of the newest published record (0 = none).
    pub newest_seen_id: i64,

    /// `watched_at` of the oldest published record.
    pub oldest_seen_at: Option<DateTimeWithTimeZone>,

    /// Trakt history ID of the oldest published record (0 = none).
    pub oldest_seen_id: i64,

    pub created_at: DateTimeWithTimeZone,

    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
