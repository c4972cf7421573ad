//! Progress reporting for sync runs.
//!
//! - Interactive mode (TTY): one styled line per event on stderr
//! - Logging mode (non-TTY, and always under `serve`): structured tracing

mod interactive;
mod logging;

use std::sync::Arc;

use console::Term;
use ownwatch::sync::{ProgressCallback, SyncProgress};

pub use interactive::InteractiveReporter;
pub use logging::LoggingReporter;

/// Progress reporter that handles both interactive and logging modes.
pub enum ProgressReporter {
    Interactive(InteractiveReporter),
    Logging(LoggingReporter),
}

impl ProgressReporter {
    /// Create a new progress reporter, auto-detecting TTY mode.
    pub fn new() -> Self {
        if Term::stderr().is_term() {
            Self::Interactive(InteractiveReporter::new())
        } else {
            Self::Logging(LoggingReporter::new())
        }
    }

    /// Create a logging reporter regardless of the terminal.
    pub fn logging() -> Self {
        Self::Logging(LoggingReporter::new())
    }

    pub fn handle(&self, event: SyncProgress) {
        match self {
            Self::Interactive(r) => r.handle(event),
            Self::Logging(r) => r.handle(event),
        }
    }

    /// Convert to a ProgressCallback for the library.
    pub fn into_callback(self) -> ProgressCallback {
        let reporter = Arc::new(self);
        Arc::new(move |event| reporter.handle(event))
    }
}

impl Default for ProgressReporter {
    fn default() -> Self {
        Self::new()
    }
}
