use tokio::signal;

/// Resolves when the process is asked to stop: Ctrl+C anywhere, SIGTERM on
/// unix. A handler that fails to install parks its branch forever so the
/// other one still works.
pub(crate) async fn shutdown_signal() {
    tokio::select! {
        _ = ctrl_c() => tracing::info!("Ctrl+C received, shutting down"),
        _ = sigterm() => tracing::info!("SIGTERM received, shutting down"),
    }
}

async fn ctrl_c() {
    if let Err(err) = signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to install Ctrl+C handler");
        std::future::pending::<()>().await;
    }
}

#[cfg(unix)]
async fn sigterm() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(err) => {
            tracing::error!(error = %err, "Failed to install SIGTERM handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn sigterm() {
    std::future::pending::<()>().await;
}
