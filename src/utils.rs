//! Process-level helpers for the server binary.

use std::future::pending;

use tokio::signal;
use tracing::{error, warn};

/// Resolve when the process is asked to stop (Ctrl+C or SIGTERM).
///
/// A signal source that cannot be installed is logged and ignored; the other
/// one still triggers shutdown. In-flight requests are drained by
/// `axum::serve`'s graceful shutdown once this future completes.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {e}");
            pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            warn!("Received Ctrl+C, draining connections before exit");
        }
        () = terminate => {
            warn!("Received SIGTERM, draining connections before exit");
        }
    }
}
