//! Error types for Berth
//!
//! Uses `thiserror` for library errors. Every variant is fatal to the run:
//! the only recovery Berth performs is the bounded retry around fetch, and
//! that is handled before an error reaches this type's callers.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Berth operations
pub type BerthResult<T> = Result<T, BerthError>;

/// Main error type for Berth operations
#[derive(Error, Debug)]
pub enum BerthError {
    /// Invoked without root privileges; nothing has been touched
    #[error("must be run as root (effective uid is {uid})")]
    NotRoot { uid: u32 },

    /// A required tool is absent and no supported package manager exists
    #[error("'{tool}' is not installed and neither apt-get nor yum is available")]
    MissingDependency { tool: String },

    /// A package manager was found but the install command failed
    #[error("installing '{tool}' failed: {detail}")]
    InstallFailed { tool: String, detail: String },

    /// A non-retried subprocess exited unsuccessfully
    #[error("command '{program}' failed (exit code {code:?}): {stderr}")]
    CommandFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    /// A retried operation used up its whole attempt budget
    #[error("{operation} failed after {attempts} attempts")]
    RetriesExhausted { operation: String, attempts: u32 },

    /// Config file could not be parsed
    #[error("invalid config in {file}: {message}")]
    Config { file: PathBuf, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
