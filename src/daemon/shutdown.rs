use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Waits for Ctrl-C, or SIGTERM on unix, and cancels everything listening on `cancelation`.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    select! {
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C"),
        _ = terminate => info!("Received termination signal"),
        // Something else already decided to stop.
        _ = cancelation.cancelled() => return,
    };
    cancelation.cancel();
}
