//! OS シグナル待ち
//!
//! - unix: SIGINT / SIGTERM / ctrl_c のいずれか
//! - その他: ctrl_c のみ

use tokio_util::sync::CancellationToken;

#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv() => {},
        _ = sigterm.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}

/// Cancel `stop` on the first shutdown signal. Returns early if `stop` fires first.
pub(crate) async fn watch(stop: CancellationToken) {
    tokio::select! {
        res = wait_for_shutdown_signal() => match res {
            Ok(()) => {
                tracing::info!("shutdown signal received");
                stop.cancel();
            }
            Err(e) => tracing::warn!("could not install signal handlers: {e}"),
        },
        _ = stop.cancelled() => {}
    }
}
