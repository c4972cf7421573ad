use console::{Term, style};
use ownwatch::sync::SyncProgress;

/// Prints one line per notable event to stderr.
pub struct InteractiveReporter {
    term: Term,
}

impl InteractiveReporter {
    pub fn new() -> Self {
        Self {
            term: Term::stderr(),
        }
    }

    pub fn handle(&self, event: SyncProgress) {
        if let Some(line) = render(event) {
            let _ = self.term.write_line(&line);
        }
    }
}

impl Default for InteractiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

fn render(event: SyncProgress) -> Option<String> {
    let line = match event {
        SyncProgress::RunStarted { user, direction } => {
            format!("{} {} ({})", style("Syncing").bold().cyan(), user, direction)
        }
        SyncProgress::FetchedPage {
            page,
            page_count,
            count,
            ..
        } => format!(
            "  {} page {}/{} ({} records)",
            style("fetched").dim(),
            page,
            page_count,
            count
        ),
        SyncProgress::Published { summary, .. } => {
            format!("  {} {}", style("✓").green(), summary)
        }
        SyncProgress::SkippedUnsupported { record_id, kind, .. } => format!(
            "  {} record {} ({}): unsupported kind",
            style("-").yellow(),
            record_id,
            kind
        ),
        SyncProgress::PublishFailed {
            record_id, error, ..
        } => format!(
            "  {} record {}: {}",
            style("✗").red(),
            record_id,
            error
        ),
        SyncProgress::RunComplete {
            pages,
            published,
            skipped,
            ..
        } => format!(
            "{} {} published, {} skipped, {} page(s)",
            style("Done:").bold(),
            published,
            skipped,
            pages
        ),
        _ => return None,
    };
    Some(line)
}
