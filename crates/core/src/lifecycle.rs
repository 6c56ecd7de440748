//! Process lifecycle helpers shared by every long-lived task the AI plane
//! runs (the cleanup worker, the HTTP listener).

use std::time::Duration;
use tracing::{info, warn};

/// Wait for SIGINT or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT"),
        _ = terminate => info!("received SIGTERM"),
    }
}

/// Run `body` until cancelled via `shutdown_signal`, logging entry/exit.
/// Used to bind a background task (e.g. the cleanup worker) to the same
/// shutdown signal the rest of the process listens for without letting
/// either future block the other.
pub async fn run_until_shutdown<F>(task_name: &str, body: F)
where
    F: std::future::Future<Output = ()>,
{
    tokio::select! {
        _ = body => {
            warn!(task = task_name, "task exited on its own before shutdown");
        }
        _ = shutdown_signal() => {
            info!(task = task_name, "shutdown signal received");
        }
    }
}

/// Sleep that never returns an error; a thin wrapper kept so call sites
/// read the same way regardless of which timer primitive backs it.
pub async fn sleep(duration: Duration) {
    tokio::time::sleep(duration).await;
}
