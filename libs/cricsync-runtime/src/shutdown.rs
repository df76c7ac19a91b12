//! Process shutdown coordination.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;
use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Handle the sync run uses to ask the host to terminate.
pub trait ShutdownRequester: Send + Sync {
    fn request_shutdown(&self);
}

/// Host lifetime backed by a root cancellation token.
///
/// Requesting shutdown cancels the root token, which in turn cancels every
/// child token handed out by [`token`](Self::token). Repeated requests are
/// harmless; only the first one is logged.
#[derive(Debug, Default)]
pub struct AppLifetime {
    root: CancellationToken,
    requested: AtomicBool,
}

impl AppLifetime {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that fires once shutdown is requested.
    #[must_use]
    pub fn token(&self) -> CancellationToken {
        self.root.child_token()
    }

    #[must_use]
    pub fn is_shutdown_requested(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Resolves once shutdown has been requested.
    pub async fn stopping(&self) {
        self.root.cancelled().await;
    }
}

impl ShutdownRequester for AppLifetime {
    fn request_shutdown(&self) {
        if !self.requested.swap(true, Ordering::AcqRel) {
            tracing::info!("Application shutdown requested");
        }
        self.root.cancel();
    }
}

/// Calls [`ShutdownRequester::request_shutdown`] exactly once, when dropped.
///
/// The guard is moved into the spawned run future before it is first
/// polled, so the request fires on completion, error, panic, abort, and
/// even when the future is dropped without ever running.
pub(crate) struct ShutdownGuard {
    requester: Option<Arc<dyn ShutdownRequester>>,
}

impl ShutdownGuard {
    pub(crate) fn new(requester: Arc<dyn ShutdownRequester>) -> Self {
        Self {
            requester: Some(requester),
        }
    }
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        if let Some(requester) = self.requester.take() {
            requester.request_shutdown();
        }
    }
}

/// Signals that can trigger shutdown.
enum ShutdownSignal {
    CtrlC,
    #[cfg(unix)]
    Sigterm,
}

/// Wait for termination signals (Ctrl+C, SIGTERM).
///
/// # Errors
/// Returns an error if a signal handler cannot be installed.
pub async fn wait_for_shutdown() -> Result<()> {
    let signal = tokio::select! {
        result = wait_ctrl_c() => result?,
        result = wait_sigterm() => result?,
    };

    let name = match signal {
        ShutdownSignal::CtrlC => "ctrl_c",
        #[cfg(unix)]
        ShutdownSignal::Sigterm => "sigterm",
    };
    tracing::info!(signal = name, "Shutdown signal received");
    Ok(())
}

async fn wait_ctrl_c() -> Result<ShutdownSignal> {
    signal::ctrl_c().await.map_err(|e| {
        tracing::error!(%e, "Error handling Ctrl+C signal");
        e
    })?;
    Ok(ShutdownSignal::CtrlC)
}

#[cfg(unix)]
async fn wait_sigterm() -> Result<ShutdownSignal> {
    let mut handler = signal::unix::signal(signal::unix::SignalKind::terminate()).map_err(|e| {
        tracing::error!(%e, "Failed to install SIGTERM handler");
        e
    })?;
    handler.recv().await;
    Ok(ShutdownSignal::Sigterm)
}

#[cfg(not(unix))]
async fn wait_sigterm() -> Result<ShutdownSignal> {
    std::future::pending::<Result<ShutdownSignal>>().await
}
