//! Runtime for the CricClubs sync host.
//!
//! ## Modules
//!
//! - [`lifecycle`]: run states, outcomes and lifecycle errors
//! - [`job`]: the run body trait and the placeholder body
//! - [`service`]: the supervised single-run service
//! - [`shutdown`]: host lifetime, shutdown requests and OS signals
//! - [`host`]: snapshot-to-outcome wiring for the binary
//! - [`logging`]: global subscriber setup and its flush guard

pub mod host;
pub mod job;
pub mod lifecycle;
pub mod logging;
pub mod service;
pub mod shutdown;

pub use host::{HostOptions, SyncHost};
pub use job::{JobError, PlaceholderSync, SyncJob, SyncSettings};
pub use lifecycle::{LifecycleError, LifecycleState, TaskOutcome};
pub use logging::{LoggingConfig, LoggingGuard, init_logging};
pub use service::SyncService;
pub use shutdown::{AppLifetime, ShutdownRequester, wait_for_shutdown};

// Re-exported so job implementors need not depend on tokio-util directly.
pub use tokio_util::sync::CancellationToken;
