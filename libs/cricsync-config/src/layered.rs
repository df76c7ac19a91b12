//! Standard source layering for the host process.
//!
//! Precedence, low to high:
//! 1) compiled defaults (the records' `Default`)
//! 2) `appsettings.{yaml|yml|json}` (required)
//! 3) `appsettings.{Environment}.{ext}` (optional)
//! 4) environment variables
//! 5) command-line arguments

use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::snapshot::{ConfigBuilder, ConfigSnapshot};
use crate::source::{CommandLineSource, EnvSource, FileSource};

pub const DEFAULT_ENVIRONMENT: &str = "Production";
pub const SETTINGS_FILE_STEM: &str = "appsettings";
const SETTINGS_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

#[derive(Debug, Clone)]
pub struct LayeredConfig {
    config_dir: PathBuf,
    environment: String,
    env_prefix: Option<String>,
    args: Vec<String>,
}

impl LayeredConfig {
    #[must_use]
    pub fn new(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            environment: DEFAULT_ENVIRONMENT.to_owned(),
            env_prefix: None,
            args: Vec::new(),
        }
    }

    /// Environment name selecting the optional overlay file.
    #[must_use]
    pub fn environment(mut self, name: impl Into<String>) -> Self {
        self.environment = name.into();
        self
    }

    /// Restricts the environment-variable layer to names with this prefix.
    #[must_use]
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Command-line arguments forming the top layer.
    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn environment_name(&self) -> &str {
        &self.environment
    }

    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// The base settings file: the first existing extension, or the YAML
    /// path when none exists (so the error names a concrete file).
    #[must_use]
    pub fn base_file(&self) -> PathBuf {
        self.find_settings_file(SETTINGS_FILE_STEM)
            .unwrap_or_else(|| self.config_dir.join(format!("{SETTINGS_FILE_STEM}.yaml")))
    }

    /// The environment overlay file, if one exists.
    #[must_use]
    pub fn environment_file(&self) -> Option<PathBuf> {
        self.find_settings_file(&format!("{SETTINGS_FILE_STEM}.{}", self.environment))
    }

    fn find_settings_file(&self, stem: &str) -> Option<PathBuf> {
        SETTINGS_EXTENSIONS
            .iter()
            .map(|ext| self.config_dir.join(format!("{stem}.{ext}")))
            .find(|path| path.is_file())
    }

    /// Builder with all layers registered in precedence order.
    #[must_use]
    pub fn builder(&self) -> ConfigBuilder {
        let mut builder = ConfigBuilder::new().add_source(FileSource::required(self.base_file()));
        if let Some(path) = self.environment_file() {
            builder = builder.add_source(FileSource::optional(path));
        }
        let env = match &self.env_prefix {
            Some(prefix) => EnvSource::prefixed(prefix.clone()),
            None => EnvSource::new(),
        };
        builder
            .add_source(env)
            .add_source(CommandLineSource::new(self.args.iter().cloned()))
    }

    /// Loads and merges every layer.
    ///
    /// # Errors
    /// Returns [`ConfigError::MissingFile`] when the base file is absent, or
    /// any error raised by an individual layer.
    pub fn load(&self) -> Result<ConfigSnapshot, ConfigError> {
        tracing::info!(
            config_dir = %self.config_dir.display(),
            environment = %self.environment,
            "Loading layered configuration"
        );
        self.builder().build()
    }
}
