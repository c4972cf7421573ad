use console::Term;
use tokio_util::sync::CancellationToken;

/// Install the Ctrl+C handler and return the token it cancels.
///
/// The first Ctrl+C asks running work to wind down; a second one exits
/// immediately.
pub(crate) fn setup_shutdown_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let cancel = token.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Failed to install Ctrl+C handler: {}", e);
            return;
        }

        let is_tty = Term::stderr().is_term();
        if is_tty {
            eprintln!("\n\nShutdown requested, finishing in-flight syncs...");
            eprintln!("Press Ctrl+C again to force quit.");
        } else {
            tracing::warn!("Shutdown requested, finishing in-flight syncs");
        }

        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            if is_tty {
                eprintln!("Force quit!");
            }
            std::process::exit(130);
        }
    });

    token
}
