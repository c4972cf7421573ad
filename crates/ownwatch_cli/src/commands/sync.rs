use console::style;
use ownwatch::sync::{Direction, SyncReport};

use super::shared::build_service;
use crate::config::Config;
use crate::progress::ProgressReporter;

/// Run one sync for `profile_url` in the foreground.
///
/// Catch-up runs stop after the first page unless `all_pages` is set; backfill
/// runs always page to the end.
pub(crate) async fn handle_sync(
    config: &Config,
    database_url: &str,
    profile_url: &str,
    older: bool,
    all_pages: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let db = ownwatch::connect_and_migrate(database_url).await?;
    let service = build_service(config, db, ProgressReporter::new().into_callback())?;

    let direction = if older {
        Direction::Older
    } else {
        Direction::Newer
    };
    let report = service
        .run_now(profile_url, direction, older || all_pages)
        .await?;

    print_report(profile_url, direction, &report);
    Ok(())
}

fn print_report(profile_url: &str, direction: Direction, report: &SyncReport) {
    println!(
        "{} {} sync for {}: {} published, {} skipped, {} page(s)",
        if report.is_complete() {
            style("✓").green().bold()
        } else {
            style("!").yellow().bold()
        },
        direction,
        style(profile_url).cyan(),
        report.published,
        report.skipped,
        report.pages_fetched,
    );
    if let Some(error) = &report.publish_error {
        println!(
            "  {} stopped at a rejected publish; the next run picks up from here: {}",
            style("warning:").yellow(),
            error
        );
    }
}
