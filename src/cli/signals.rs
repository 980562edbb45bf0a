//! Interrupt handling
//!
//! An install spends most of its time either blocked on operator input or
//! streaming into the cache, and neither leaves anything half-written at a
//! destination. An interrupt therefore just says goodbye and exits.

use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Message printed when the operator interrupts a run
pub const FAREWELL: &str = "\nGoodbye! Come back soon.";

/// Exit status after an interrupt (128 + SIGINT)
pub const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Wait for Ctrl+C or SIGTERM on a background task, then exit the process
///
/// The watcher runs on its own task so that it fires even while the main
/// task is blocked reading from the terminal.
pub fn spawn_interrupt_watcher() -> JoinHandle<()> {
    tokio::spawn(async {
        wait_for_interrupt().await;
        eprintln!("{}", FAREWELL);
        std::process::exit(INTERRUPTED_EXIT_CODE);
    })
}

/// Resolve when an interrupt or terminate signal arrives
pub async fn wait_for_interrupt() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C signal received"),
            Err(e) => {
                warn!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("SIGTERM signal received");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
