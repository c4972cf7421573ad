//! User management: register profile URLs and their credentials.

use clap::Subcommand;
use console::style;
use ownwatch::{AccessToken, DbUserStore, StoreError, User, UserStore};
use url::Url;

#[derive(Subcommand)]
pub(crate) enum UserAction {
    /// Add a user, or update the credentials of an existing one
    Add {
        /// Profile URL identifying the user (e.g. https://example.com/)
        profile_url: String,

        /// Micropub endpoint of the user's site
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Trakt access token
        #[arg(long, env = "OWNWATCH_TRAKT_TOKEN", hide_env_values = true)]
        trakt_token: Option<String>,

        /// Micropub access token
        #[arg(long, env = "OWNWATCH_MICROPUB_TOKEN", hide_env_values = true)]
        micropub_token: Option<String>,
    },
    /// List all users
    List,
}

pub(crate) async fn handle_user(
    action: UserAction,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = ownwatch::connect_and_migrate(database_url).await?;
    let store = DbUserStore::new(db);

    match action {
        UserAction::Add {
            profile_url,
            endpoint,
            trakt_token,
            micropub_token,
        } => {
            add_user(&store, &profile_url, endpoint, trakt_token, micropub_token).await?;
        }
        UserAction::List => list_users(&store).await?,
    }
    Ok(())
}

async fn add_user(
    store: &DbUserStore,
    profile_url: &str,
    endpoint: Option<String>,
    trakt_token: Option<String>,
    micropub_token: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    Url::parse(profile_url).map_err(|e| format!("Invalid profile URL '{profile_url}': {e}"))?;
    if let Some(endpoint) = &endpoint {
        Url::parse(endpoint).map_err(|e| format!("Invalid endpoint '{endpoint}': {e}"))?;
    }

    let (mut user, created) = match store.get(profile_url).await {
        Ok(user) => (user, false),
        Err(StoreError::NotFound(_)) => (User::new(profile_url), true),
        Err(e) => return Err(e.into()),
    };
    merge(&mut user, endpoint, trakt_token, micropub_token);
    store.save(&user).await?;

    println!(
        "{} {} user {}",
        style("✓").green().bold(),
        if created { "Added" } else { "Updated" },
        style(profile_url).cyan()
    );
    if !user.is_eligible() {
        println!(
            "  {} needs an endpoint and both tokens before it can sync",
            style("note:").yellow()
        );
    }
    Ok(())
}

/// Apply only the values that were given; the rest stay as stored.
fn merge(
    user: &mut User,
    endpoint: Option<String>,
    trakt_token: Option<String>,
    micropub_token: Option<String>,
) {
    if let Some(endpoint) = endpoint {
        user.publish_endpoint = Some(endpoint);
    }
    if let Some(token) = trakt_token {
        user.history_token = Some(AccessToken::bearer(token));
    }
    if let Some(token) = micropub_token {
        user.publish_token = Some(AccessToken::bearer(token));
    }
}

async fn list_users(store: &DbUserStore) -> Result<(), Box<dyn std::error::Error>> {
    let users = store.get_all().await?;
    if users.is_empty() {
        println!("No users configured.");
        return Ok(());
    }
    for user in users {
        let marker = if user.is_eligible() {
            style("●").green()
        } else {
            style("○").dim()
        };
        println!("{marker} {}", user.profile_url);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_unset_fields() {
        let mut user = User::new("https://alice.example/");
        user.publish_endpoint = Some("https://alice.example/micropub".into());
        user.publish_token = Some(AccessToken::bearer("old"));

        merge(&mut user, None, Some("trakt".into()), None);

        assert_eq!(
            user.publish_endpoint.as_deref(),
            Some("https://alice.example/micropub")
        );
        assert_eq!(
            user.history_token.map(|t| t.access_token),
            Some("trakt".to_string())
        );
        assert_eq!(
            user.publish_token.map(|t| t.access_token),
            Some("old".to_string())
        );
    }

    #[test]
    fn merge_replaces_given_fields() {
        let mut user = User::new("https://alice.example/");
        user.publish_token = Some(AccessToken::bearer("old"));

        merge(&mut user, None, None, Some("new".into()));

        assert_eq!(
            user.publish_token.map(|t| t.access_token),
            Some("new".to_string())
        );
    }
}
