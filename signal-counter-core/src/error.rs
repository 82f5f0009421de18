//! Error types for signal-counter-core

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the signal-counter-core library
#[derive(Error, Debug)]
pub enum Error {
    /// GPIO setup failed; fatal at startup
    #[error("hardware init error: {0}")]
    HardwareInit(String),

    /// A filesystem operation on one of the queue slots failed
    #[error("failed to {action} {}: {source}", path.display())]
    Filesystem {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Network or HTTP failure talking to the collector
    #[error("transport error: {0}")]
    Transport(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build a closure that wraps an `io::Error` with the failed action and path.
    pub(crate) fn fs(
        action: &'static str,
        path: impl Into<PathBuf>,
    ) -> impl FnOnce(std::io::Error) -> Error {
        let path = path.into();
        move |source| Error::Filesystem {
            action,
            path,
            source,
        }
    }
}

/// Result type alias for signal-counter-core
pub type Result<T> = std::result::Result<T, Error>;
