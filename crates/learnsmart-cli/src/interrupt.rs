//! Ctrl+C handling.
//!
//! Commands race [`CtrlC::pressed`] against the active request and cancel it
//! through the controller; nothing here touches global state.

use tokio::sync::mpsc;

#[derive(Debug)]
pub struct InterruptedError;

impl std::fmt::Display for InterruptedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Interrupted")
    }
}

impl std::error::Error for InterruptedError {}

/// Ctrl+C presses from one long-lived listener task.
///
/// Presses that arrive while nobody is waiting are queued, so a command loop
/// never misses one between `select!` iterations.
#[derive(Debug)]
pub struct CtrlC {
    presses: mpsc::UnboundedReceiver<()>,
}

impl CtrlC {
    /// Spawns the listener. Must be called inside the runtime.
    pub fn listen() -> Self {
        let (tx, presses) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            loop {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::warn!("Ctrl+C handler unavailable: {e}");
                    return;
                }
                if tx.send(()).is_err() {
                    return;
                }
            }
        });
        Self::new(presses)
    }

    fn new(presses: mpsc::UnboundedReceiver<()>) -> Self {
        Self { presses }
    }

    /// Resolves on the next press. Never resolves once the listener is gone.
    ///
    /// Cancel-safe: a press is only consumed when this returns.
    pub async fn pressed(&mut self) {
        if self.presses.recv().await.is_none() {
            std::future::pending::<()>().await;
        }
    }
}
