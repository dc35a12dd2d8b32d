use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while talking to an LMS1xx device or running the acquisition session.
#[derive(Debug, Error)]
pub enum Error {
    /// The transport could not be established or was lost.
    #[error("transport error: {description}")]
    Transport { description: String },

    /// An I/O error occurred on the underlying stream.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The device rejected a command or answered with something unexpected.
    #[error("protocol error: {description}")]
    Protocol { description: String },

    /// No reply or scan arrived before the deadline.
    #[error("operation timeout")]
    Timeout,

    /// The device reported a configuration or state this driver cannot work with.
    #[error("configuration mismatch: {description}")]
    ConfigMismatch { description: String },

    /// A command was issued while no transport is connected.
    #[error("device is not connected")]
    NotConnected,

    /// The driver configuration file could not be read or parsed.
    #[error("invalid configuration {}: {description}", path.display())]
    Config { path: PathBuf, description: String },
}

impl Error {
    pub(crate) fn protocol(description: impl Into<String>) -> Error {
        Error::Protocol {
            description: description.into(),
        }
    }

    pub(crate) fn transport(description: impl Into<String>) -> Error {
        Error::Transport {
            description: description.into(),
        }
    }

    /// Returns `true` when the error means a deadline expired rather than a hard failure.
    pub fn is_timeout(&self) -> bool {
        match self {
            Error::Timeout => true,
            Error::Io(err) => matches!(
                err.kind(),
                io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }
}

/// A specialized `Result` type for LMS1xx operations.
pub type Result<T> = std::result::Result<T, Error>;
