//! Lifecycle states of the supervised sync run.
//!
//! ```text
//! Created -> Starting -> Running -> Completed | Faulted | Cancelled
//!                                         \-> StopRequested -> Stopped
//! ```
//!
//! `Starting` may settle directly into a terminal state when the run is
//! cancelled before its body begins. `StopRequested` is reachable from every
//! non-stopped state so teardown works even when the run never started.

use std::fmt;

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    Created,
    Starting,
    Running,
    Completed,
    Faulted,
    Cancelled,
    StopRequested,
    Stopped,
}

impl LifecycleState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Faulted => "faulted",
            Self::Cancelled => "cancelled",
            Self::StopRequested => "stop_requested",
            Self::Stopped => "stopped",
        }
    }

    /// True for the states a finished run body settles into.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Faulted | Self::Cancelled)
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        use LifecycleState::{
            Cancelled, Completed, Created, Faulted, Running, Starting, StopRequested, Stopped,
        };
        match (self, next) {
            (Created, Starting | StopRequested)
            | (Starting, Running | StopRequested)
            | (Starting | Running, Completed | Faulted | Cancelled)
            | (Running | Completed | Faulted | Cancelled, StopRequested)
            | (StopRequested, Stopped) => true,
            _ => false,
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the run body ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed,
    /// The body returned an error or panicked. Holds the rendered cause.
    Faulted(String),
    Cancelled,
}

impl TaskOutcome {
    /// Terminal state matching this outcome.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        match self {
            Self::Completed => LifecycleState::Completed,
            Self::Faulted(_) => LifecycleState::Faulted,
            Self::Cancelled => LifecycleState::Cancelled,
        }
    }

    #[must_use]
    pub fn is_faulted(&self) -> bool {
        matches!(self, Self::Faulted(_))
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => f.write_str("completed"),
            Self::Faulted(cause) => write!(f, "faulted: {cause}"),
            Self::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Errors returned by lifecycle operations that can be refused.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("sync service cannot be started from state '{state}'")]
    AlreadyStarted { state: LifecycleState },

    #[error("sync service must be started from within a tokio runtime")]
    NoRuntime,
}

/// Shared, validated state holder.
#[derive(Debug)]
pub(crate) struct StateCell {
    state: Mutex<LifecycleState>,
}

impl StateCell {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(LifecycleState::Created),
        }
    }

    pub(crate) fn get(&self) -> LifecycleState {
        *self.state.lock()
    }

    /// Applies `next` if the transition is legal. Illegal transitions leave the
    /// state untouched and are reported at `warn`.
    pub(crate) fn transition(&self, next: LifecycleState) -> bool {
        let mut state = self.state.lock();
        let current = *state;
        if current.can_transition_to(next) {
            tracing::debug!(from = %current, to = %next, "Sync service state changed");
            *state = next;
            true
        } else {
            tracing::warn!(from = %current, to = %next, "Ignoring illegal sync service state transition");
            false
        }
    }

    /// Moves `expected -> next` only when the current state is `expected`.
    pub(crate) fn advance(&self, expected: LifecycleState, next: LifecycleState) -> bool {
        let mut state = self.state.lock();
        if *state == expected && expected.can_transition_to(next) {
            tracing::debug!(from = %expected, to = %next, "Sync service state changed");
            *state = next;
            true
        } else {
            false
        }
    }

    /// Records the body's terminal state, unless teardown already took over.
    pub(crate) fn settle(&self, outcome: &TaskOutcome) {
        let next = outcome.state();
        let mut state = self.state.lock();
        if matches!(*state, LifecycleState::Starting | LifecycleState::Running) {
            tracing::debug!(from = %*state, to = %next, "Sync service state changed");
            *state = next;
        } else {
            tracing::debug!(state = %*state, outcome = %next, "Run settled after stop was requested");
        }
    }
}
