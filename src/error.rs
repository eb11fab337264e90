//! Library error types.
//!
//! ```text
//! Error
//! ├── Config          invalid option / load-dependent call without loading
//! ├── CompileProcess  compiler exited non-zero (carries buffered stderr)
//! ├── Spawn           compiler could not be started
//! ├── Load            module unreadable or failed while executing
//! ├── UnknownTemplate name does not resolve to a template
//! ├── Render          template failed while rendering
//! └── Io              filesystem failure outside the recoverable paths
//! ```

use std::path::PathBuf;
use std::process::ExitStatus;

use thiserror::Error;

pub use crate::config::ConfigError;

/// Result alias used throughout the library.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("`{program}` failed with {status}\n{stderr}")]
    CompileProcess {
        program: String,
        status: ExitStatus,
        stderr: String,
    },

    #[error("failed to spawn `{program}`")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load `{}`: {message}", path.display())]
    Load { path: PathBuf, message: String },

    #[error("unknown template `{name}`: {reason}")]
    UnknownTemplate { name: String, reason: String },

    #[error("error rendering `{template}`: {message}")]
    Render { template: String, message: String },

    #[error("IO error on `{}`", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn load(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Whether this error came from the external compiler.
    pub fn is_compile_failure(&self) -> bool {
        matches!(self, Self::CompileProcess { .. } | Self::Spawn { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_display() {
        let err = Error::load("/out/a.soy.js", "goog.require could not find: soy");
        let display = err.to_string();
        assert!(display.contains("/out/a.soy.js"));
        assert!(display.contains("could not find: soy"));
    }

    #[test]
    fn test_config_error_is_transparent() {
        let err: Error = ConfigError::LoadingDisabled.into();
        assert_eq!(err.to_string(), ConfigError::LoadingDisabled.to_string());
        assert!(!err.is_compile_failure());
    }
}
