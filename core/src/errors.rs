//! Error types for the remote file system adapter.
//!
//! [`FsError`] is the single error surfaced to callers. Its variants are the
//! distinguishable failure kinds: configuration, connection validation,
//! remote transfer failure and unsupported operation. Remote client backends
//! report [`TransferError`], which converts into [`FsError::Transfer`].

use std::io;

use thiserror::Error;

/// Top-level error type returned by sessions, adapters and streams.
#[derive(Error, Debug)]
pub enum FsError {
    /// Malformed server URL, unknown protocol or unusable raw settings.
    #[error("Config error: {0}")]
    Config(String),

    /// Connect parameters rejected before any network I/O.
    #[error("Connection validation failed: {0}")]
    Validation(String),

    /// A remote operation (list, get, put, remove, move, mkdir, stat) failed.
    #[error("Transfer failed: {0}")]
    Transfer(#[from] TransferError),

    /// The session was closed before the operation was issued.
    #[error("Session is closed")]
    Closed,

    /// The remote store does not expose this operation.
    #[error("Operation not supported: {0}")]
    NotSupported(&'static str),

    /// Local scratch-file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Errors reported by a [`RemoteClient`](crate::client::RemoteClient).
#[derive(Error, Debug)]
pub enum TransferError {
    /// The remote path does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The server refused the operation on this path.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Any other protocol-level failure.
    #[error("{0}")]
    Failed(String),

    /// Reading or writing the local side of a transfer failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl FsError {
    /// Returns true when the error is a remote not-found condition.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FsError::Transfer(TransferError::NotFound(_)))
    }
}

/// Lets stream upload failures travel through `std::io::Write::flush`.
impl From<FsError> for io::Error {
    fn from(e: FsError) -> Self {
        match e {
            FsError::Io(e) => e,
            FsError::Transfer(TransferError::Io(e)) => e,
            FsError::Transfer(TransferError::NotFound(msg)) => {
                io::Error::new(io::ErrorKind::NotFound, msg)
            }
            FsError::Transfer(TransferError::PermissionDenied(msg)) => {
                io::Error::new(io::ErrorKind::PermissionDenied, msg)
            }
            FsError::NotSupported(op) => io::Error::new(io::ErrorKind::Unsupported, op),
            FsError::Closed => io::Error::new(io::ErrorKind::NotConnected, "session is closed"),
            FsError::Config(msg) | FsError::Validation(msg) => {
                io::Error::new(io::ErrorKind::InvalidInput, msg)
            }
            other => io::Error::other(other.to_string()),
        }
    }
}

/// Result alias used throughout the crate.
pub type FsResult<T> = Result<T, FsError>;
