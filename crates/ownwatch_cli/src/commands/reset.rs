use chrono::Utc;
use console::style;
use ownwatch::{DbUserStore, UserStore, WatermarkState};

/// Move both sync boundaries of `profile_url` to now.
///
/// Nothing already in the history is published afterwards; only watches made
/// after the reset are picked up. A server running elsewhere is not
/// consulted, so run this while it is stopped or use its reset route.
pub(crate) async fn handle_reset(
    database_url: &str,
    profile_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = ownwatch::connect_and_migrate(database_url).await?;
    let store = DbUserStore::new(db);

    let mut user = store.get(profile_url).await?;
    user.watermark = WatermarkState::reset(Utc::now());
    store.save(&user).await?;

    println!(
        "{} Reset sync history for {}",
        style("✓").green().bold(),
        style(profile_url).cyan()
    );
    Ok(())
}
