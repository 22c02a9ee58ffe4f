use std::io;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Forwards the first SIGINT/SIGTERM into the returned channel.
///
/// Must be called from within a tokio runtime. The forwarding task ends on
/// the first signal or when `cancel` fires; if the handlers cannot be
/// installed the channel simply closes.
pub(crate) fn forward_termination_signals(cancel: CancellationToken) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            result = termination_requested() => match result {
                Ok(()) => {
                    log::info!("Termination signal received");
                    let _ = tx.try_send(());
                }
                Err(err) => log::error!("Failed to listen for termination signals: {err}"),
            },
        }
    });
    rx
}

#[cfg(unix)]
async fn termination_requested() -> io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
    }
    Ok(())
}

#[cfg(not(unix))]
async fn termination_requested() -> io::Result<()> {
    tokio::signal::ctrl_c().await
}
