//! Host wiring: configuration snapshot in, terminal outcome out.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cricsync_config::{
    ClientConfig, ConfigError, ConfigSnapshot, Options, Section, SectionReader, StoreConfig,
    SyncOptions,
};

use crate::job::SyncJob;
use crate::lifecycle::TaskOutcome;
use crate::service::SyncService;
use crate::shutdown::{AppLifetime, ShutdownRequester, wait_for_shutdown};

pub const DEFAULT_SHUTDOWN_TIMEOUT_SECONDS: i32 = 5;

/// Settings of the host itself, bound from the `Host` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOptions {
    pub shutdown_timeout_seconds: i32,
}

impl Default for HostOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout_seconds: DEFAULT_SHUTDOWN_TIMEOUT_SECONDS,
        }
    }
}

impl HostOptions {
    /// Grace period for the run to unwind. Negative values mean no wait.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(u64::try_from(self.shutdown_timeout_seconds).unwrap_or(0))
    }
}

impl Section for HostOptions {
    const NAME: &'static str = "Host";

    fn bind(section: &SectionReader<'_>) -> Result<Self, ConfigError> {
        let d = Self::default();
        Ok(Self {
            shutdown_timeout_seconds: section
                .i32("ShutdownTimeoutSeconds", d.shutdown_timeout_seconds)?,
        })
    }
}

/// Runs the sync service for one process lifetime.
pub struct SyncHost {
    snapshot: Arc<ConfigSnapshot>,
    job: Option<Arc<dyn SyncJob>>,
    handle_signals: bool,
}

impl SyncHost {
    #[must_use]
    pub fn new(snapshot: Arc<ConfigSnapshot>) -> Self {
        Self {
            snapshot,
            job: None,
            handle_signals: true,
        }
    }

    /// Overrides the run body (the placeholder by default).
    #[must_use]
    pub fn with_job(mut self, job: Arc<dyn SyncJob>) -> Self {
        self.job = Some(job);
        self
    }

    /// Disables Ctrl+C / SIGTERM handling, for embedding and tests.
    #[must_use]
    pub fn without_signals(mut self) -> Self {
        self.handle_signals = false;
        self
    }

    /// Builds the service, starts it, waits for a shutdown request (from the
    /// run itself or a signal), then stops it and reports the outcome.
    ///
    /// # Errors
    /// Returns an error if the host options or any option section fails to
    /// bind, or if the service cannot be started. Failures inside the run are
    /// reported through the returned [`TaskOutcome`] instead.
    pub async fn run(self) -> Result<TaskOutcome> {
        let host: HostOptions = self
            .snapshot
            .bind()
            .context("failed to bind host options")?;
        let lifetime = Arc::new(AppLifetime::new());

        let service = SyncService::new(
            &Options::<ClientConfig>::from_snapshot(Arc::clone(&self.snapshot)),
            &Options::<StoreConfig>::from_snapshot(Arc::clone(&self.snapshot)),
            &Options::<SyncOptions>::from_snapshot(Arc::clone(&self.snapshot)),
            lifetime.clone(),
        )
        .context("failed to construct the sync service")?;
        let service = match self.job {
            Some(job) => service.with_job(job),
            None => service,
        };

        service
            .start(&lifetime.token())
            .context("failed to start the sync service")?;

        let signals = self.handle_signals.then(|| {
            let lifetime = Arc::clone(&lifetime);
            tokio::spawn(async move {
                tokio::select! {
                    result = wait_for_shutdown() => {
                        if let Err(e) = result {
                            tracing::error!(error = %e, "Signal handling failed, shutting down");
                        }
                        lifetime.request_shutdown();
                    }
                    () = lifetime.stopping() => {}
                }
            })
        });

        lifetime.stopping().await;
        service.stop(host.shutdown_timeout()).await;

        if let Some(signals) = signals {
            signals.abort();
        }

        let outcome = service.outcome().unwrap_or(TaskOutcome::Cancelled);
        if outcome.is_faulted() {
            tracing::warn!(outcome = %outcome, "Sync host finished after a faulted run");
        } else {
            tracing::info!(outcome = %outcome, "Sync host finished");
        }
        Ok(outcome)
    }
}
