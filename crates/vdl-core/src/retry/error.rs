//! Transfer error type for retry classification.

use std::fmt;

/// Error returned by a single transfer attempt (manifest, segment or direct file).
/// Kept separate from the engine error so attempts can be classified and retried
/// before anything is reported upward.
#[derive(Debug)]
pub enum TransferError {
    /// Curl reported an error (timeout, connection, etc.).
    Curl(curl::Error),
    /// HTTP response had a non-2xx status.
    Http(u32),
    /// Server announced a Content-Length but closed early.
    PartialTransfer { expected: u64, received: u64 },
    /// 2xx response without a body; a media segment is never empty.
    EmptyBody,
    /// Disk/storage write failed (e.g. disk full, permission denied). Not retried.
    Storage(std::io::Error),
    /// Cancellation was observed during the transfer.
    Cancelled,
    /// The blocking transfer task could not be joined.
    Join(String),
}

impl TransferError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransferError::Cancelled)
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferError::Curl(e) => write!(f, "{}", e),
            TransferError::Http(code) => write!(f, "HTTP {}", code),
            TransferError::PartialTransfer { expected, received } => {
                write!(f, "partial transfer: expected {} bytes, got {}", expected, received)
            }
            TransferError::EmptyBody => write!(f, "empty response body"),
            TransferError::Storage(e) => write!(f, "storage: {}", e),
            TransferError::Cancelled => write!(f, "cancelled"),
            TransferError::Join(msg) => write!(f, "transfer task failed: {}", msg),
        }
    }
}

impl std::error::Error for TransferError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TransferError::Curl(e) => Some(e),
            TransferError::Storage(e) => Some(e),
            TransferError::Http(_)
            | TransferError::PartialTransfer { .. }
            | TransferError::EmptyBody
            | TransferError::Cancelled
            | TransferError::Join(_) => None,
        }
    }
}
