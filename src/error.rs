//! Error types for the matrix client
//!
//! Transport failures are hard errors surfaced to the caller. Malformed
//! replies are not errors at all: the parser returns `None` for them.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Transport-level failure while connecting to or talking with the device.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("timed out after {after:?} talking to {addr}")]
    Timeout { addr: String, after: Duration },

    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("socket error: {0}")]
    Io(#[from] io::Error),

    #[error("connection closed by device")]
    Closed,

    #[error("reply exceeded {limit} bytes without a line terminator")]
    ReplyTooLong { limit: usize },
}

/// Error returned by matrix client operations.
#[derive(Error, Debug)]
pub enum MatrixError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("zone {zone} out of range (device has {zones} zones)")]
    InvalidZone { zone: u8, zones: u8 },

    #[error("invalid device identity: {0}")]
    InvalidIdentity(String),
}

impl MatrixError {
    /// True when the failure came from the transport rather than from caller input.
    pub fn is_connection_error(&self) -> bool {
        matches!(self, MatrixError::Connection(_))
    }
}

pub type Result<T> = std::result::Result<T, MatrixError>;
