use std::fmt;
use std::sync::Arc;

use crate::bind::Section;
use crate::error::ConfigError;
use crate::snapshot::ConfigSnapshot;

type Producer<T> = dyn Fn() -> Result<T, ConfigError> + Send + Sync;

/// Deferred handle to a bound options record.
///
/// Consumers call [`resolve`](Self::resolve) once, at construction time,
/// and handle the error instead of receiving a value that may throw later.
pub struct Options<T> {
    producer: Arc<Producer<T>>,
}

impl<T: 'static> Options<T> {
    /// Wraps an already-bound value.
    #[must_use]
    pub fn new(value: T) -> Self
    where
        T: Clone + Send + Sync,
    {
        Self::from_fn(move || Ok(value.clone()))
    }

    /// Wraps an arbitrary fallible producer.
    pub fn from_fn<F>(producer: F) -> Self
    where
        F: Fn() -> Result<T, ConfigError> + Send + Sync + 'static,
    {
        Self {
            producer: Arc::new(producer),
        }
    }

    /// Binds `T` from `snapshot` each time the handle is resolved.
    #[must_use]
    pub fn from_snapshot(snapshot: Arc<ConfigSnapshot>) -> Self
    where
        T: Section,
    {
        Self::from_fn(move || snapshot.bind::<T>())
    }

    /// Produces the options value.
    ///
    /// # Errors
    /// Propagates whatever the underlying producer raises, typically a
    /// [`ConfigError::InvalidValue`] from binding.
    pub fn resolve(&self) -> Result<T, ConfigError> {
        (self.producer)()
    }
}

impl<T> Clone for Options<T> {
    fn clone(&self) -> Self {
        Self {
            producer: Arc::clone(&self.producer),
        }
    }
}

impl<T> fmt::Debug for Options<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options").finish_non_exhaustive()
    }
}
