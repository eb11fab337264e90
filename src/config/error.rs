//! Configuration error types.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error when reading `{}`", .0.display())]
    Io(PathBuf, #[source] std::io::Error),

    #[error("config parsing error")]
    Toml(#[from] toml::de::Error),

    #[error("unknown option(s): {}", .0.join(", "))]
    UnknownKeys(Vec<String>),

    #[error("config validation error: {0}")]
    Validation(String),

    #[error("templates are not loaded in memory: enable `load_compiled_templates`")]
    LoadingDisabled,
}
