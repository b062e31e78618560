//! Signal handling for graceful shutdown.

use anyhow::Result;
use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Set up signal handlers for graceful shutdown.
///
/// Returns a token that is cancelled when SIGTERM or SIGINT arrives.
pub fn setup_signal_handlers() -> Result<CancellationToken> {
    let token = CancellationToken::new();
    let mut sigterm = signal(SignalKind::terminate())?;

    let shutdown = token.clone();
    tokio::spawn(async move {
        let interrupted = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received SIGINT"),
                Err(e) => {
                    warn!(error = %e, "SIGINT handler unavailable");
                    std::future::pending::<()>().await;
                }
            }
        };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            () = interrupted => {}
        }
        shutdown.cancel();
    });

    Ok(token)
}
