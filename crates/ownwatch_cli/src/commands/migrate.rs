use console::style;
use ownwatch::db;
use ownwatch::entity::prelude::UserEntity;
use ownwatch::migration::{Migrator, MigratorTrait};
use sea_orm::{DatabaseConnection, EntityTrait, PaginatorTrait};

use crate::MigrateAction;

pub(crate) async fn handle_migrate(
    action: MigrateAction,
    database_url: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = db::connect(database_url).await?;

    match action {
        MigrateAction::Up => {
            println!("Applying migrations...");
            Migrator::up(&db, None).await?;
            println!("Migrations applied successfully.");
            println!("{}", users_line(count_users(&db).await));
        }
        MigrateAction::Down => {
            warn_sync_state_loss(&db).await;
            println!("Rolling back last migration...");
            Migrator::down(&db, Some(1)).await?;
            println!("Rollback complete.");
        }
        MigrateAction::Status => {
            println!("Migration status (table ownwatch_migrations):");
            Migrator::status(&db).await?;
            println!("{}", users_line(count_users(&db).await));
        }
        MigrateAction::Fresh => {
            warn_sync_state_loss(&db).await;
            println!("Dropping all tables and reapplying migrations...");
            Migrator::fresh(&db).await?;
            println!("Fresh migration complete.");
        }
    }

    Ok(())
}

/// Rows in `users`, or `None` when the table does not exist yet.
async fn count_users(db: &DatabaseConnection) -> Option<u64> {
    UserEntity::find().count(db).await.ok()
}

fn users_line(count: Option<u64>) -> String {
    match count {
        Some(1) => "users table: 1 user".to_string(),
        Some(n) => format!("users table: {n} users"),
        None => "users table: not created".to_string(),
    }
}

/// Dropping `users` discards every credential and watermark; the next sync
/// would start from an empty history.
async fn warn_sync_state_loss(db: &DatabaseConnection) {
    if let Some(n) = count_users(db).await.filter(|n| *n > 0) {
        eprintln!(
            "{} dropping the users table discards credentials and sync state for {} user(s)",
            style("warning:").yellow().bold(),
            n
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn users_line_reports_missing_table() {
        assert_eq!(users_line(None), "users table: not created");
        assert_eq!(users_line(Some(0)), "users table: 0 users");
        assert_eq!(users_line(Some(1)), "users table: 1 user");
        assert_eq!(users_line(Some(3)), "users table: 3 users");
    }
}
