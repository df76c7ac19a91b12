//! Merged configuration snapshot and the builder that layers sources into it.

use std::collections::BTreeMap;

use crate::bind::{Section, SectionReader};
use crate::error::ConfigError;
use crate::source::ConfigSource;

/// Separator between path segments, e.g. `SyncOptions:SeasonIds:0`.
pub const KEY_DELIMITER: char = ':';

/// Canonical (case-folded, trimmed) form of a key path.
#[must_use]
pub fn normalize_key(key: &str) -> String {
    key.split(KEY_DELIMITER)
        .map(|segment| segment.trim().to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join(":")
}

/// Joins a parent path and a child segment.
#[must_use]
pub fn join_key(parent: &str, child: &str) -> String {
    if parent.is_empty() {
        child.to_owned()
    } else {
        format!("{parent}{KEY_DELIMITER}{child}")
    }
}

/// Immutable view of the merged configuration.
///
/// Keys are matched case-insensitively; values are the raw text supplied by
/// whichever source won for that key. Typed interpretation happens only when
/// a section is bound.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigSnapshot {
    entries: BTreeMap<String, String>,
}

impl ConfigSnapshot {
    /// Builds a snapshot from key/value pairs; later pairs override earlier ones.
    #[must_use]
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut snapshot = Self::default();
        for (key, value) in pairs {
            snapshot.insert(key.as_ref(), value.into());
        }
        snapshot
    }

    fn insert(&mut self, key: &str, value: String) {
        let key = normalize_key(key);
        if key.is_empty() {
            return;
        }
        self.entries.insert(key, value);
    }

    /// Raw value for `key`, if any source supplied one.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(&normalize_key(key)).map(String::as_str)
    }

    /// True when at least one key lives under `section`.
    #[must_use]
    pub fn has_section(&self, section: &str) -> bool {
        let prefix = format!("{}{KEY_DELIMITER}", normalize_key(section));
        self.entries
            .range(prefix.clone()..)
            .next()
            .is_some_and(|(key, _)| key.starts_with(&prefix))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Normalized keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Reader scoped to one section of this snapshot.
    #[must_use]
    pub fn section(&self, name: &'static str) -> SectionReader<'_> {
        SectionReader::new(self, name)
    }

    /// Binds section `T` from this snapshot.
    ///
    /// Binding only reads the snapshot, so binding the same snapshot twice
    /// yields equal records.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidValue`] when a present value cannot be
    /// parsed as the field's type. The whole section fails in that case.
    pub fn bind<T: Section>(&self) -> Result<T, ConfigError> {
        let value = T::bind(&self.section(T::NAME))?;
        tracing::debug!(section = T::NAME, "Bound configuration section");
        Ok(value)
    }
}

/// Ordered list of configuration sources. Later sources win on key collisions.
#[derive(Default)]
pub struct ConfigBuilder {
    sources: Vec<Box<dyn ConfigSource>>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn add_source(mut self, source: impl ConfigSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    /// Number of registered sources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Loads every source in order and merges them into one snapshot.
    ///
    /// # Errors
    /// Returns the first error raised by a source (missing required file,
    /// unreadable or malformed file, malformed command-line argument).
    pub fn build(&self) -> Result<ConfigSnapshot, ConfigError> {
        let mut snapshot = ConfigSnapshot::default();
        for source in &self.sources {
            let pairs = source.load()?;
            tracing::debug!(
                source = %source.describe(),
                keys = pairs.len(),
                "Loaded configuration source"
            );
            for (key, value) in pairs {
                snapshot.insert(&key, value);
            }
        }
        Ok(snapshot)
    }
}
