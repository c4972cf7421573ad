//! Database connection utilities.

use sea_orm::{Database, DatabaseConnection, DbErr};

/// Configure SQLite pragmas for a long-running process with concurrent syncs.
///
/// This sets:
/// - `journal_mode=WAL` so status reads don't block watermark writes
/// - `busy_timeout=5000` so concurrent per-user saves wait instead of failing
/// - `synchronous=NORMAL`, which is safe with WAL
async fn configure_sqlite(db: &DatabaseConnection) -> Result<(), DbErr> {
    use sea_orm::{ConnectionTrait, Statement};

    for pragma in [
        "PRAGMA journal_mode=WAL",
        "PRAGMA busy_timeout=5000",
        "PRAGMA synchronous=NORMAL",
    ] {
        db.execute(Statement::from_string(
            db.get_database_backend(),
            pragma.to_string(),
        ))
        .await?;
    }

    Ok(())
}

fn is_sqlite_file(database_url: &str) -> bool {
    database_url.starts_with("sqlite://")
}

/// Establish a connection to the database.
///
/// File-backed SQLite databases get WAL mode, a 5 second busy timeout and
/// `synchronous=NORMAL`.
///
/// # Arguments
/// * `database_url` - e.g. `sqlite:///var/lib/ownwatch/ownwatch.db?mode=rwc` or `postgres:///ownwatch`
///
/// # Errors
/// Returns `DbErr` if the connection cannot be established.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect(database_url).await?;

    if is_sqlite_file(database_url) {
        configure_sqlite(&db).await?;
    }

    Ok(db)
}

/// Establish a connection and bring the schema up to date.
///
/// # Errors
/// Returns `DbErr` if the connection cannot be established or migrations fail.
///
/// # Example
/// ```ignore
/// let db = ownwatch::connect_and_migrate("sqlite::memory:").await?;
/// ```
#[cfg(feature = "migrate")]
pub async fn connect_and_migrate(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    use sea_orm_migration::MigratorTrait;

    let db = connect(database_url).await?;
    crate::migration::Migrator::up(&db, None).await?;
    Ok(db)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    #[tokio::test]
    async fn configure_sqlite_runs_all_pragmas() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite)
            .append_exec_results((0..3).map(|_| MockExecResult {
                rows_affected: 0,
                last_insert_id: 0,
            }))
            .into_connection();

        configure_sqlite(&db)
            .await
            .expect("mock sqlite pragma execs should succeed");
    }

    #[test]
    fn only_file_databases_get_pragmas() {
        assert!(is_sqlite_file("sqlite:///tmp/ownwatch.db?mode=rwc"));
        assert!(!is_sqlite_file("sqlite::memory:"));
        assert!(!is_sqlite_file("postgres:///ownwatch"));
    }

    #[tokio::test]
    async fn connect_returns_error_for_invalid_database_url() {
        let err = connect("this-is-not-a-db-url")
            .await
            .expect_err("invalid URL should error");
        let msg = err.to_string().to_ascii_lowercase();
        assert!(
            msg.contains("error") || msg.contains("invalid"),
            "unexpected error message: {err}"
        );
    }
}
