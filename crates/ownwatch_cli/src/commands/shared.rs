//! Wiring shared by the commands that talk to Trakt and Micropub.

use std::sync::Arc;

use console::style;
use ownwatch::store::DbUserStore;
use ownwatch::sync::ProgressCallback;
use ownwatch::{
    MicropubClient, StoredCredentials, SyncEngine, SyncService, TokenProvider, TraktClient,
    WatermarkState,
};
use sea_orm::DatabaseConnection;

use crate::config::Config;

/// Build the production service: Trakt in, Micropub out, users in the database.
pub(crate) fn build_service(
    config: &Config,
    db: DatabaseConnection,
    on_progress: ProgressCallback,
) -> Result<SyncService, Box<dyn std::error::Error>> {
    let client_id = config
        .trakt
        .client_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or("Trakt client id is not configured (set OWNWATCH_TRAKT__CLIENT_ID)")?;

    let tokens: Arc<dyn TokenProvider> = Arc::new(StoredCredentials);
    let trakt = TraktClient::new(client_id, Arc::clone(&tokens))?
        .with_api_url(&config.trakt.api_url)
        .with_timeout(config.fetch_timeout());
    let micropub = MicropubClient::new(tokens)?.with_timeout(config.publish_timeout());
    let store = Arc::new(DbUserStore::new(db));

    Ok(
        SyncService::new(SyncEngine::new(Arc::new(trakt), Arc::new(micropub), store))
            .with_unknown_kind(config.sync.unknown_kind)
            .with_progress(on_progress),
    )
}

/// One-line rendering of a watermark for terminal output.
pub(crate) fn describe_watermark(watermark: &WatermarkState) -> String {
    match (watermark.oldest_seen_time(), watermark.newest_seen_time()) {
        (Some(oldest), Some(newest)) => format!(
            "{} (#{}) .. {} (#{})",
            oldest.to_rfc3339(),
            watermark.oldest_seen_id(),
            newest.to_rfc3339(),
            watermark.newest_seen_id()
        ),
        _ => style("never synced").dim().to_string(),
    }
}
