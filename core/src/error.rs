//! Error types shared by every crate in the workspace.
//!
//! Only load-time and parse-time failures are errors. Lookups that miss a
//! cluster map or a target word without alignment links are handled with
//! sentinel values and never surface here.

use std::path::PathBuf;

/// Result alias defaulting to [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required parameter is missing or has an invalid value.
    #[error("configuration error: {0}")]
    Config(String),

    /// A cluster map or model file could not be opened or read.
    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The language model file is readable but its contents are corrupt.
    #[error("failed to load language model '{}': {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },

    /// The file carries a model header this build does not understand.
    #[error("unsupported language model format in '{}': {reason}", path.display())]
    UnsupportedFormat { path: PathBuf, reason: String },

    /// Malformed user-supplied text (alignment strings, feature lines).
    #[error("malformed input at line {line}: {reason}")]
    Format { line: usize, reason: String },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub fn model_load(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::ModelLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`Error::Format`] value.
    pub fn format(line: usize, reason: impl Into<String>) -> Self {
        Error::Format {
            line,
            reason: reason.into(),
        }
    }
}
