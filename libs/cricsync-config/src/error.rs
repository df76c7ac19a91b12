use std::path::PathBuf;

/// Errors raised while loading configuration sources or binding sections.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("required configuration file not found: {}", path.display())]
    MissingFile { path: PathBuf },

    #[error("failed to read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("unsupported configuration file format: {} (expected .yaml, .yml or .json)", path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("invalid command-line argument '{argument}': {reason}")]
    InvalidArgument {
        argument: String,
        reason: &'static str,
    },

    #[error("invalid value '{value}' for '{key}' in section '{section}': expected {expected}")]
    InvalidValue {
        section: &'static str,
        key: String,
        value: String,
        expected: &'static str,
    },

    #[error("options for section '{section}' are unavailable: {reason}")]
    Unavailable {
        section: &'static str,
        reason: String,
    },
}

impl ConfigError {
    /// Section name for errors that are tied to a single section.
    #[must_use]
    pub fn section(&self) -> Option<&'static str> {
        match self {
            Self::InvalidValue { section, .. } | Self::Unavailable { section, .. } => Some(section),
            _ => None,
        }
    }
}
