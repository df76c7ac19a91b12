//! Supervised single-run sync service.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use cricsync_config::{ClientConfig, ConfigError, Options, StoreConfig, SyncOptions};
use futures::FutureExt;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::job::{PlaceholderSync, SyncJob, SyncSettings, is_cancellation};
use crate::lifecycle::{LifecycleError, LifecycleState, StateCell, TaskOutcome};
use crate::shutdown::{ShutdownGuard, ShutdownRequester};

/// Runs one [`SyncJob`] to completion and then asks the host to shut down.
///
/// Errors and panics raised by the job are contained: they settle the
/// service into [`LifecycleState::Faulted`] and never reach the caller of
/// [`start`](Self::start). Shutdown is requested exactly once per started
/// run, whatever the outcome.
pub struct SyncService {
    settings: Arc<SyncSettings>,
    job: Arc<dyn SyncJob>,
    shutdown: Arc<dyn ShutdownRequester>,
    state: Arc<StateCell>,
    outcome: Arc<Mutex<Option<TaskOutcome>>>,
    run_token: Mutex<Option<CancellationToken>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl SyncService {
    /// Resolves the three option handles and builds an idle service running
    /// [`PlaceholderSync`].
    ///
    /// # Errors
    /// Propagates the first error raised while resolving an option handle.
    pub fn new(
        client: &Options<ClientConfig>,
        store: &Options<StoreConfig>,
        sync: &Options<SyncOptions>,
        shutdown: Arc<dyn ShutdownRequester>,
    ) -> Result<Self, ConfigError> {
        let settings = SyncSettings {
            client: client.resolve()?,
            store: store.resolve()?,
            sync: sync.resolve()?,
        };
        Ok(Self::from_settings(settings, shutdown))
    }

    #[must_use]
    pub fn from_settings(settings: SyncSettings, shutdown: Arc<dyn ShutdownRequester>) -> Self {
        Self {
            settings: Arc::new(settings),
            job: Arc::new(PlaceholderSync::new()),
            shutdown,
            state: Arc::new(StateCell::new()),
            outcome: Arc::new(Mutex::new(None)),
            run_token: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    /// Replaces the run body.
    #[must_use]
    pub fn with_job(mut self, job: Arc<dyn SyncJob>) -> Self {
        self.job = job;
        self
    }

    #[must_use]
    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.state.get()
    }

    /// How the run ended, once it has.
    #[must_use]
    pub fn outcome(&self) -> Option<TaskOutcome> {
        self.outcome.lock().clone()
    }

    /// Spawns the run under `cancel`.
    ///
    /// If `cancel` has already fired, the body is skipped, the service settles
    /// into [`LifecycleState::Cancelled`] and shutdown is still requested.
    ///
    /// # Errors
    /// Returns [`LifecycleError::AlreadyStarted`] unless the service is in
    /// [`LifecycleState::Created`], and [`LifecycleError::NoRuntime`] when
    /// called outside a tokio runtime.
    pub fn start(&self, cancel: &CancellationToken) -> Result<(), LifecycleError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| LifecycleError::NoRuntime)?;
        if !self
            .state
            .advance(LifecycleState::Created, LifecycleState::Starting)
        {
            return Err(LifecycleError::AlreadyStarted {
                state: self.state.get(),
            });
        }

        let token = cancel.child_token();
        *self.run_token.lock() = Some(token.clone());

        let guard = ShutdownGuard::new(Arc::clone(&self.shutdown));
        let run = execute(
            Arc::clone(&self.job),
            Arc::clone(&self.settings),
            Arc::clone(&self.state),
            Arc::clone(&self.outcome),
            token,
            guard,
        );
        *self.handle.lock() = Some(runtime.spawn(run));

        tracing::info!(job = self.job.name(), "Sync service started");
        Ok(())
    }

    /// Cancels the run and waits up to `timeout` for it to unwind, aborting it
    /// afterwards. Safe before [`start`](Self::start) and safe to repeat.
    pub async fn stop(&self, timeout: Duration) {
        match self.state.get() {
            LifecycleState::Stopped | LifecycleState::StopRequested => {
                tracing::debug!("Sync service already stopping");
                return;
            }
            _ => {}
        }
        self.state.transition(LifecycleState::StopRequested);

        if let Some(token) = self.run_token.lock().as_ref() {
            token.cancel();
        }

        let handle = self.handle.lock().take();
        if let Some(mut handle) = handle {
            match tokio::time::timeout(timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => tracing::warn!(error = %e, "Sync run task ended abnormally"),
                Err(_) => {
                    tracing::warn!(
                        timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                        "Sync run did not stop in time, aborting"
                    );
                    handle.abort();
                    let _ = handle.await;
                    self.outcome.lock().get_or_insert(TaskOutcome::Cancelled);
                }
            }
        }

        self.state.transition(LifecycleState::Stopped);
        tracing::info!(outcome = ?self.outcome(), "Sync service stopped");
    }
}

impl std::fmt::Debug for SyncService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncService")
            .field("job", &self.job.name())
            .field("state", &self.state.get())
            .field("outcome", &self.outcome())
            .finish_non_exhaustive()
    }
}

async fn execute(
    job: Arc<dyn SyncJob>,
    settings: Arc<SyncSettings>,
    state: Arc<StateCell>,
    outcome_slot: Arc<Mutex<Option<TaskOutcome>>>,
    token: CancellationToken,
    _shutdown: ShutdownGuard,
) {
    let outcome = if token.is_cancelled() {
        tracing::info!("Cancellation requested before the sync run began, skipping");
        TaskOutcome::Cancelled
    } else {
        state.advance(LifecycleState::Starting, LifecycleState::Running);
        run_contained(job.as_ref(), &settings, token).await
    };

    match &outcome {
        TaskOutcome::Faulted(cause) => tracing::error!(error = %cause, "Sync run faulted"),
        other => tracing::info!(outcome = %other, "Sync run finished"),
    }
    state.settle(&outcome);
    *outcome_slot.lock() = Some(outcome);
}

async fn run_contained(
    job: &dyn SyncJob,
    settings: &SyncSettings,
    token: CancellationToken,
) -> TaskOutcome {
    match AssertUnwindSafe(job.run(settings, token)).catch_unwind().await {
        Ok(Ok(())) => TaskOutcome::Completed,
        Ok(Err(err)) if is_cancellation(&err) => TaskOutcome::Cancelled,
        Ok(Err(err)) => TaskOutcome::Faulted(format!("{err:#}")),
        Err(panic) => TaskOutcome::Faulted(format!("panicked: {}", panic_message(panic.as_ref()))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic payload"
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing_test::traced_test;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl ShutdownRequester for Counter {
        fn request_shutdown(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Failing;

    #[async_trait::async_trait]
    impl SyncJob for Failing {
        async fn run(&self, _: &SyncSettings, _: CancellationToken) -> anyhow::Result<()> {
            anyhow::bail!("store unreachable")
        }
    }

    async fn settled(service: &SyncService) -> TaskOutcome {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(outcome) = service.outcome() {
                    return outcome;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap()
    }

    #[test]
    fn panic_message_reads_common_payloads() {
        let text: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(text.as_ref()), "boom");
        let owned: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(owned.as_ref()), "bang");
        let other: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }

    #[test]
    fn start_outside_runtime_is_refused() {
        let service = SyncService::from_settings(SyncSettings::default(), Arc::new(Counter::default()));
        assert_eq!(
            service.start(&CancellationToken::new()),
            Err(LifecycleError::NoRuntime)
        );
        assert_eq!(service.state(), LifecycleState::Created);
    }

    #[tokio::test]
    #[traced_test]
    async fn fault_is_logged_with_cause() {
        let counter = Arc::new(Counter::default());
        let service = SyncService::from_settings(SyncSettings::default(), counter.clone())
            .with_job(Arc::new(Failing));

        service.start(&CancellationToken::new()).unwrap();
        let outcome = settled(&service).await;
        service.stop(Duration::from_secs(5)).await;

        assert!(outcome.is_faulted());
        assert!(logs_contain("Sync run faulted"));
        assert!(logs_contain("store unreachable"));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
