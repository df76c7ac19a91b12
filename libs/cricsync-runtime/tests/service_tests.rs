#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Lifecycle tests for `SyncService`: containment, cancellation and the
//! exactly-once shutdown request.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use cricsync_config::{ClientConfig, ConfigError, Options, StoreConfig, SyncOptions};
use cricsync_runtime::{
    CancellationToken, LifecycleError, LifecycleState, PlaceholderSync, ShutdownRequester,
    SyncJob, SyncService, SyncSettings, TaskOutcome,
};
use tokio::sync::Notify;

const WAIT: Duration = Duration::from_secs(5);

/// Counts shutdown requests and lets tests await the first one.
#[derive(Default)]
struct ShutdownProbe {
    calls: AtomicUsize,
    notify: Notify,
}

impl ShutdownProbe {
    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn wait(&self) {
        let notified = self.notify.notified();
        if self.calls() > 0 {
            return;
        }
        tokio::time::timeout(WAIT, notified)
            .await
            .expect("shutdown was never requested");
    }
}

impl ShutdownRequester for ShutdownProbe {
    fn request_shutdown(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_waiters();
    }
}

struct Failing;

#[async_trait]
impl SyncJob for Failing {
    async fn run(&self, _: &SyncSettings, _: CancellationToken) -> anyhow::Result<()> {
        anyhow::bail!("forced failure")
    }
}

struct Panicking;

#[async_trait]
impl SyncJob for Panicking {
    async fn run(&self, _: &SyncSettings, _: CancellationToken) -> anyhow::Result<()> {
        panic!("job exploded")
    }
}

/// Records whether its body ran at all.
#[derive(Default)]
struct Probe {
    ran: AtomicBool,
}

#[async_trait]
impl SyncJob for Probe {
    async fn run(&self, _: &SyncSettings, _: CancellationToken) -> anyhow::Result<()> {
        self.ran.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Ignores cancellation entirely.
struct Stubborn;

#[async_trait]
impl SyncJob for Stubborn {
    async fn run(&self, _: &SyncSettings, _: CancellationToken) -> anyhow::Result<()> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(())
    }
}

fn default_options() -> (
    Options<ClientConfig>,
    Options<StoreConfig>,
    Options<SyncOptions>,
) {
    (
        Options::new(ClientConfig::default()),
        Options::new(StoreConfig::default()),
        Options::new(SyncOptions::default()),
    )
}

fn service_with(job: Arc<dyn SyncJob>, probe: &Arc<ShutdownProbe>) -> SyncService {
    let (client, store, sync) = default_options();
    SyncService::new(&client, &store, &sync, probe.clone())
        .unwrap()
        .with_job(job)
}

#[tokio::test]
async fn placeholder_run_completes_and_requests_shutdown_once() {
    let probe = Arc::new(ShutdownProbe::default());
    let service = service_with(
        Arc::new(PlaceholderSync::with_delay(Duration::from_millis(10))),
        &probe,
    );

    service.start(&CancellationToken::new()).unwrap();
    probe.wait().await;
    service.stop(WAIT).await;

    assert_eq!(service.outcome(), Some(TaskOutcome::Completed));
    assert_eq!(service.state(), LifecycleState::Stopped);
    assert_eq!(probe.calls(), 1);
}

#[tokio::test]
async fn completed_state_is_observable_before_stop() {
    let probe = Arc::new(ShutdownProbe::default());
    let service = service_with(Arc::new(Probe::default()), &probe);

    service.start(&CancellationToken::new()).unwrap();
    probe.wait().await;

    assert_eq!(service.state(), LifecycleState::Completed);
    service.stop(WAIT).await;
}

#[tokio::test]
async fn cancellation_before_start_skips_body_and_still_requests_shutdown() {
    let probe = Arc::new(ShutdownProbe::default());
    let job = Arc::new(Probe::default());
    let service = service_with(job.clone(), &probe);
    let cancel = CancellationToken::new();
    cancel.cancel();

    service.start(&cancel).unwrap();
    probe.wait().await;

    assert!(!job.ran.load(Ordering::SeqCst));
    assert_eq!(service.outcome(), Some(TaskOutcome::Cancelled));
    assert_eq!(service.state(), LifecycleState::Cancelled);
    assert_eq!(probe.calls(), 1);
}

#[tokio::test]
async fn cancellation_immediately_after_start_requests_shutdown_once() {
    let probe = Arc::new(ShutdownProbe::default());
    let service = service_with(
        Arc::new(PlaceholderSync::with_delay(Duration::from_secs(3600))),
        &probe,
    );
    let cancel = CancellationToken::new();

    service.start(&cancel).unwrap();
    cancel.cancel();
    probe.wait().await;
    service.stop(WAIT).await;

    assert_eq!(service.outcome(), Some(TaskOutcome::Cancelled));
    assert_eq!(probe.calls(), 1);
}

#[tokio::test]
async fn body_error_is_contained_and_faults() {
    let probe = Arc::new(ShutdownProbe::default());
    let service = service_with(Arc::new(Failing), &probe);

    let started = service.start(&CancellationToken::new());
    probe.wait().await;

    assert!(started.is_ok());
    assert_eq!(service.state(), LifecycleState::Faulted);
    match service.outcome() {
        Some(TaskOutcome::Faulted(cause)) => assert!(cause.contains("forced failure")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(probe.calls(), 1);

    service.stop(WAIT).await;
    assert_eq!(service.state(), LifecycleState::Stopped);
    assert_eq!(probe.calls(), 1);
}

#[tokio::test]
async fn body_panic_is_contained_and_faults() {
    let probe = Arc::new(ShutdownProbe::default());
    let service = service_with(Arc::new(Panicking), &probe);

    service.start(&CancellationToken::new()).unwrap();
    probe.wait().await;

    match service.outcome() {
        Some(TaskOutcome::Faulted(cause)) => assert!(cause.contains("job exploded")),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(probe.calls(), 1);
    service.stop(WAIT).await;
}

#[tokio::test]
async fn stop_cancels_a_running_body() {
    let probe = Arc::new(ShutdownProbe::default());
    let service = service_with(
        Arc::new(PlaceholderSync::with_delay(Duration::from_secs(3600))),
        &probe,
    );

    service.start(&CancellationToken::new()).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    service.stop(WAIT).await;

    assert_eq!(service.outcome(), Some(TaskOutcome::Cancelled));
    assert_eq!(service.state(), LifecycleState::Stopped);
    assert_eq!(probe.calls(), 1);
}

#[tokio::test]
async fn stop_aborts_a_body_that_ignores_cancellation() {
    let probe = Arc::new(ShutdownProbe::default());
    let service = service_with(Arc::new(Stubborn), &probe);

    service.start(&CancellationToken::new()).unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    service.stop(Duration::from_millis(50)).await;

    assert_eq!(service.outcome(), Some(TaskOutcome::Cancelled));
    assert_eq!(service.state(), LifecycleState::Stopped);
    assert_eq!(probe.calls(), 1);
}

#[tokio::test]
async fn stop_before_start_is_safe_and_idempotent() {
    let probe = Arc::new(ShutdownProbe::default());
    let service = service_with(Arc::new(Probe::default()), &probe);

    service.stop(WAIT).await;
    service.stop(WAIT).await;

    assert_eq!(service.state(), LifecycleState::Stopped);
    assert_eq!(service.outcome(), None);
    assert_eq!(probe.calls(), 0);
}

#[tokio::test]
async fn start_after_stop_is_refused() {
    let probe = Arc::new(ShutdownProbe::default());
    let service = service_with(Arc::new(Probe::default()), &probe);
    service.stop(WAIT).await;

    let err = service.start(&CancellationToken::new()).unwrap_err();

    assert_eq!(
        err,
        LifecycleError::AlreadyStarted {
            state: LifecycleState::Stopped
        }
    );
}

#[tokio::test]
async fn second_start_is_refused() {
    let probe = Arc::new(ShutdownProbe::default());
    let service = service_with(Arc::new(Probe::default()), &probe);

    service.start(&CancellationToken::new()).unwrap();
    let err = service.start(&CancellationToken::new()).unwrap_err();

    assert!(matches!(err, LifecycleError::AlreadyStarted { .. }));
    probe.wait().await;
    service.stop(WAIT).await;
    assert_eq!(probe.calls(), 1);
}

#[tokio::test]
async fn settings_reach_the_body() {
    struct Capture(parking_lot::Mutex<Option<SyncSettings>>);

    #[async_trait]
    impl SyncJob for Capture {
        async fn run(&self, settings: &SyncSettings, _: CancellationToken) -> anyhow::Result<()> {
            *self.0.lock() = Some(settings.clone());
            Ok(())
        }
    }

    let probe = Arc::new(ShutdownProbe::default());
    let capture = Arc::new(Capture(parking_lot::Mutex::new(None)));
    let client = Options::new(ClientConfig {
        api_base_url: "https://api.cricclubs.com".to_owned(),
        ..ClientConfig::default()
    });
    let (_, store, sync) = default_options();
    let service = SyncService::new(&client, &store, &sync, probe.clone())
        .unwrap()
        .with_job(capture.clone());

    service.start(&CancellationToken::new()).unwrap();
    probe.wait().await;

    let seen = capture.0.lock().clone().unwrap();
    assert_eq!(seen.client.api_base_url, "https://api.cricclubs.com");
    assert_eq!(seen.sync.batch_size, 50);
    service.stop(WAIT).await;
}

#[test]
fn construction_failure_propagates() {
    let probe = Arc::new(ShutdownProbe::default());
    let (client, store, _) = default_options();
    let sync = Options::<SyncOptions>::from_fn(|| {
        Err(ConfigError::Unavailable {
            section: "SyncOptions",
            reason: "handle failed".to_owned(),
        })
    });

    let err = SyncService::new(&client, &store, &sync, probe.clone()).unwrap_err();

    assert_eq!(err.section(), Some("SyncOptions"));
    assert_eq!(probe.calls(), 0);
}
