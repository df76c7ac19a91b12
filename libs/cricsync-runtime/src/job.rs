//! The unit of work executed once per process run.

use std::time::Duration;

use async_trait::async_trait;
use cricsync_config::{ClientConfig, StoreConfig, SyncOptions};
use tokio_util::sync::CancellationToken;

/// Default length of the placeholder run.
pub const PLACEHOLDER_DELAY: Duration = Duration::from_millis(100);

/// The three bound option records handed to a run, read-only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSettings {
    pub client: ClientConfig,
    pub store: StoreConfig,
    pub sync: SyncOptions,
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobError {
    /// The run observed the cancellation signal and unwound.
    #[error("sync run was cancelled")]
    Cancelled,
}

/// A sync run body.
///
/// Implementations must watch `cancel` at every suspension point and return
/// [`JobError::Cancelled`] (wrapped in `anyhow`) when it fires. Any other
/// error marks the run as faulted; it never reaches the host.
#[async_trait]
pub trait SyncJob: Send + Sync {
    /// Short name used in log fields.
    fn name(&self) -> &'static str {
        "sync"
    }

    async fn run(&self, settings: &SyncSettings, cancel: CancellationToken) -> anyhow::Result<()>;
}

/// Stand-in for the real synchronization engine.
///
/// Logs the configuration surface the engine would consume, then waits a
/// bounded, cancellable delay. No network or storage I/O happens here.
#[derive(Debug, Clone)]
pub struct PlaceholderSync {
    delay: Duration,
}

impl PlaceholderSync {
    #[must_use]
    pub fn new() -> Self {
        Self {
            delay: PLACEHOLDER_DELAY,
        }
    }

    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay }
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for PlaceholderSync {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SyncJob for PlaceholderSync {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    async fn run(&self, settings: &SyncSettings, cancel: CancellationToken) -> anyhow::Result<()> {
        tracing::info!("CricClubs data sync starting");
        tracing::info!("Configuration loaded successfully");
        tracing::info!(api_base_url = %settings.client.api_base_url, "API base URL");
        tracing::info!(
            configured = settings.store.has_connection(),
            "Database connection string configured"
        );
        tracing::debug!(
            seasons = settings.sync.season_ids.len(),
            competitions = settings.sync.competition_ids.len(),
            teams = settings.sync.team_ids.len(),
            batch_size = settings.sync.batch_size,
            "Sync scope"
        );

        tokio::select! {
            () = cancel.cancelled() => {
                tracing::info!("CricClubs data sync cancelled");
                return Err(JobError::Cancelled.into());
            }
            () = tokio::time::sleep(self.delay) => {}
        }

        tracing::info!("CricClubs data sync completed");
        Ok(())
    }
}

/// True when `err` is the cooperative cancellation signal rather than a fault.
pub(crate) fn is_cancellation(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| matches!(cause.downcast_ref::<JobError>(), Some(JobError::Cancelled)))
}
