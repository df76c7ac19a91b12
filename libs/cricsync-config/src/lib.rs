//! Layered configuration for the CricClubs sync host.
//!
//! ## Modules
//!
//! - [`source`]: configuration layers (files, environment, command line, memory)
//! - [`snapshot`]: the merged, case-insensitive key/value view and its builder
//! - [`bind`]: explicit per-section binding with typed parsers
//! - [`model`]: the option records and their defaults
//! - [`options`]: deferred, fallible handles to bound records
//! - [`layered`]: the standard file → env → command-line stack

pub mod bind;
pub mod dump;
pub mod error;
pub mod layered;
pub mod model;
pub mod options;
pub mod secret;
pub mod snapshot;
pub mod source;

pub use bind::{Section, SectionReader};
pub use dump::render_effective_config;
pub use error::ConfigError;
pub use layered::{DEFAULT_ENVIRONMENT, LayeredConfig};
pub use model::{ClientConfig, StoreConfig, SyncOptions};
pub use options::Options;
pub use secret::SecretString;
pub use snapshot::{ConfigBuilder, ConfigSnapshot};
pub use source::{CommandLineSource, ConfigSource, EnvSource, FileSource, MemorySource};
