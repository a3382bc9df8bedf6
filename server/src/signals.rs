//! Signal handling

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::frame::SignalFrame;

/// Route SIGINT/SIGTERM to a graceful shutdown; a second signal exits
/// immediately.
pub fn setup_signal_handler(signal_tx: mpsc::Sender<SignalFrame>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut term = match signal(SignalKind::terminate()) {
            Ok(term) => term,
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => (),
            _ = term.recv() => (),
        }
        info!("Shutdown signal received");
        if signal_tx.send(SignalFrame::Shutdown).await.is_err() {
            warn!("Signal loop already stopped");
        }

        tokio::select! {
            _ = tokio::signal::ctrl_c() => (),
            _ = term.recv() => (),
        }
        warn!("Second signal, forcing exit");
        std::process::exit(1);
    })
}
