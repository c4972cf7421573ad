use console::style;
use ownwatch::{DbUserStore, User, UserStore};

use super::shared::describe_watermark;

/// Show the sync boundaries of one user, or of every user.
pub(crate) async fn handle_status(
    database_url: &str,
    profile_url: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = ownwatch::connect_and_migrate(database_url).await?;
    let store = DbUserStore::new(db);

    let users = match profile_url {
        Some(key) => vec![store.get(key).await?],
        None => store.get_all().await?,
    };

    if users.is_empty() {
        println!("No users configured. Add one with `ownwatch user add <profile-url>`.");
        return Ok(());
    }

    for user in &users {
        print_user(user);
    }
    Ok(())
}

fn print_user(user: &User) {
    let eligibility = if user.is_eligible() {
        style("eligible").green()
    } else {
        style("not eligible").yellow()
    };
    println!("{} ({})", style(&user.profile_url).cyan().bold(), eligibility);
    println!(
        "  endpoint:  {}",
        user.publish_endpoint.as_deref().unwrap_or("-")
    );
    println!("  synced:    {}", describe_watermark(&user.watermark));
}
