use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::OnConflict;
use sea_orm::{ActiveValue::Set, DatabaseConnection, EntityTrait, QueryOrder};

use super::{Result, StoreError, UserStore};
use crate::entity::user::{ActiveModel, Column, Entity, Model};
use crate::sync::WatermarkState;
use crate::user::{AccessToken, User};

/// SQL-backed store over a SeaORM connection.
///
/// Share it through an `Arc`; the connection itself is not `Clone` when
/// sea-orm's `mock` backend is compiled in.
#[derive(Debug)]
pub struct DbUserStore {
    db: DatabaseConnection,
}

impl DbUserStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn token_from_json(value: Option<serde_json::Value>) -> Result<Option<AccessToken>> {
    value
        .map(serde_json::from_value)
        .transpose()
        .map_err(StoreError::from)
}

fn token_to_json(token: Option<&AccessToken>) -> Result<Option<serde_json::Value>> {
    token
        .map(serde_json::to_value)
        .transpose()
        .map_err(StoreError::from)
}

fn boundary(at: Option<sea_orm::prelude::DateTimeWithTimeZone>, id: i64) -> Option<(DateTime<Utc>, i64)> {
    at.map(|at| (at.with_timezone(&Utc), id))
}

impl TryFrom<Model> for User {
    type Error = StoreError;

    fn try_from(model: Model) -> Result<Self> {
        Ok(User {
            history_token: token_from_json(model.history_token)?,
            publish_token: token_from_json(model.publish_token)?,
            watermark: WatermarkState::from_parts(
                boundary(model.newest_seen_at, model.newest_seen_id),
                boundary(model.oldest_seen_at, model.oldest_seen_id),
            ),
            profile_url: model.profile_url,
            publish_endpoint: model.publish_endpoint,
        })
    }
}

fn to_active_model(user: &User, now: DateTime<Utc>) -> Result<ActiveModel> {
    let now = now.fixed_offset();
    let watermark = &user.watermark;

    Ok(ActiveModel {
        profile_url: Set(user.profile_url.clone()),
        publish_endpoint: Set(user.publish_endpoint.clone()),
        history_token: Set(token_to_json(user.history_token.as_ref())?),
        publish_token: Set(token_to_json(user.publish_token.as_ref())?),
        newest_seen_at: Set(watermark.newest_seen_time().map(|t| t.fixed_offset())),
        newest_seen_id: Set(watermark.newest_seen_id()),
        oldest_seen_at: Set(watermark.oldest_seen_time().map(|t| t.fixed_offset())),
        oldest_seen_id: Set(watermark.oldest_seen_id()),
        created_at: Set(now),
        updated_at: Set(now),
    })
}

#[async_trait]
impl UserStore for DbUserStore {
    async fn get(&self, key: &str) -> Result<User> {
        let model = Entity::find_by_id(key.to_string())
            .one(&self.db)
            .await?
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        User::try_from(model)
    }

    async fn save(&self, user: &User) -> Result<()> {
        let model = to_active_model(user, Utc::now())?;

        let on_conflict = OnConflict::column(Column::ProfileUrl)
            .update_columns([
                Column::PublishEndpoint,
                Column::HistoryToken,
                Column::PublishToken,
                Column::NewestSeenAt,
                Column::NewestSeenId,
                Column::OldestSeenAt,
                Column::OldestSeenId,
                Column::UpdatedAt,
            ])
            .to_owned();

        Entity::insert(model)
            .on_conflict(on_conflict)
            .exec_without_returning(&self.db)
            .await?;

        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<User>> {
        Entity::find()
            .order_by_asc(Column::ProfileUrl)
            .all(&self.db)
            .await?
            .into_iter()
            .map(User::try_from)
            .collect()
    }
}
