//! ownwatch CLI - mirror Trakt watch history to a Micropub site.

mod commands;
mod config;
mod progress;
mod shutdown;

use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

use crate::commands::user::UserAction;

#[derive(Parser)]
#[command(name = "ownwatch")]
#[command(version)]
#[command(about = "Mirror Trakt watch history to a Micropub endpoint")]
#[command(
    long_about = "ownwatch publishes each movie or episode you watch on Trakt as a \
post on your own site through Micropub. It remembers how far it has synced per \
user, so runs only publish what is new, and it can backfill older history page \
by page."
)]
#[command(after_long_help = r#"EXAMPLES
    Register a user:
        $ ownwatch user add https://example.com/ --endpoint https://example.com/micropub \
              --trakt-token ... --micropub-token ...

    Publish new watches once:
        $ ownwatch sync https://example.com/

    Backfill the whole history:
        $ ownwatch sync https://example.com/ --older

    Run the scheduler and the trigger server:
        $ ownwatch serve

CONFIGURATION
    ownwatch reads configuration from:
      1. ~/.config/ownwatch/config.toml (or $XDG_CONFIG_HOME/ownwatch/config.toml)
      2. ./ownwatch.toml
      3. Environment variables (OWNWATCH_ prefix, `__` between sections)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    OWNWATCH_DATABASE__URL              Database connection string (default: ~/.local/state/ownwatch/ownwatch.db)
    OWNWATCH_TRAKT__CLIENT_ID           Trakt API application client id
    OWNWATCH_SCHEDULER__INTERVAL_MINUTES  Minutes between scheduled sweeps (default: 30)
    OWNWATCH_SERVER__BIND               Trigger server address (default: 127.0.0.1:8080)
    OWNWATCH_SYNC__UNKNOWN_KIND         abort | skip history entries that are not movies or episodes
"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler and the HTTP trigger server
    Serve,
    /// Sync one user in the foreground
    Sync {
        /// Profile URL of the user
        profile_url: String,

        /// Backfill older history instead of catching up on new watches
        #[arg(short, long)]
        older: bool,

        /// Keep paging after the first page when catching up
        #[arg(short, long)]
        all_pages: bool,
    },
    /// Forget sync history so only future watches are published
    Reset {
        /// Profile URL of the user
        profile_url: String,
    },
    /// Show sync state for one user or all users
    Status {
        /// Profile URL of the user (all users if omitted)
        profile_url: Option<String>,
    },
    /// Manage users
    User {
        #[command(subcommand)]
        action: UserAction,
    },
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
}

#[derive(Subcommand)]
pub(crate) enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Structured logs when not on a terminal, or when asked for explicitly.
    if !Term::stdout().is_term() || std::env::var_os("RUST_LOG").is_some() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("ownwatch=info,ownwatch_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config = config::Config::load();

    let cli = Cli::parse();

    let database_url = config
        .database_url()
        .ok_or("Could not determine a database location; set OWNWATCH_DATABASE__URL")?;

    // Ensure the database directory exists for SQLite
    if database_url.starts_with("sqlite://") {
        let db_path = database_url.trim_start_matches("sqlite://");
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        let db_path = std::path::Path::new(db_path);

        if db_path.is_relative() && !db_path.as_os_str().is_empty() {
            tracing::warn!(
                "Database path '{}' is relative - behavior depends on current directory. \
                 Consider using an absolute path.",
                db_path.display()
            );
        }

        if let Some(parent) = db_path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
    }

    match cli.command {
        Commands::Serve => {
            let shutdown = shutdown::setup_shutdown_handler();
            commands::serve::handle_serve(&config, &database_url, shutdown).await?;
        }
        Commands::Sync {
            profile_url,
            older,
            all_pages,
        } => {
            commands::sync::handle_sync(&config, &database_url, &profile_url, older, all_pages)
                .await?;
        }
        Commands::Reset { profile_url } => {
            commands::reset::handle_reset(&database_url, &profile_url).await?;
        }
        Commands::Status { profile_url } => {
            commands::status::handle_status(&database_url, profile_url.as_deref()).await?;
        }
        Commands::User { action } => {
            commands::user::handle_user(action, &database_url).await?;
        }
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
    }

    Ok(())
}
