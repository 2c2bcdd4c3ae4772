//! Shell error type.

use std::path::PathBuf;

use peerlink_core::SessionError;
use thiserror::Error;

/// Errors surfaced by the shell.
#[derive(Debug, Error)]
pub enum CliError {
    /// A session operation failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A file to send could not be read.
    #[error("cannot read {}: {source}", path.display())]
    ReadFile {
        /// Path given by the user.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// Terminal I/O failed.
    #[error("terminal I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Whether the shell should keep running after this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Session(err) => !err.is_fatal(),
            Self::ReadFile { .. } => true,
            Self::Io(_) => false,
        }
    }
}
