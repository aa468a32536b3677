use tokio::select;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Detects signals sent to the process and turns them into a cancellation of `cancelation`.
/// Returns early once something else cancels the token, so that it can be joined with the
/// session it guards.
pub async fn detect_shutdown(cancelation: CancellationToken) {
    select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received interrupt");
            cancelation.cancel();
        },
        _ = cancelation.cancelled() => {},
    };
}
