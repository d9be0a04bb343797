//! Error types for the slflog crate.

use thiserror::Error;

/// Errors reported by the codec, the router, and the reader.
///
/// Variants carry a human-readable description of the failure. `Io` wraps
/// the underlying `std::io::Error` unchanged so callers can inspect the
/// OS-level cause.
#[derive(Error, Debug)]
pub enum Error {
    /// A caller passed an argument the API forbids (empty where content is
    /// required, zero where a positive value is required, an offset past
    /// the end of a buffer). Raised at the boundary and never swallowed.
    #[error("invalid argument: {0}")]
    InvalidArg(String),

    /// Bytes on the wire violate the logfile grammar.
    #[error("malformed input: {0}")]
    Format(String),

    /// Structural mismatch: bytes that identify as something else, a wrong
    /// record count, or a formatter asked to handle a detail variant it
    /// does not accept.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An I/O failure from the filesystem or a stream, passed through
    /// unchanged.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Cooperative cancellation was observed. Always re-raised, never
    /// swallowed.
    #[error("operation cancelled")]
    Cancelled,

    /// An internal invariant was violated. Indicates a bug in this crate.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns true for failures the router must re-raise instead of
    /// swallowing.
    pub(crate) fn must_propagate(&self) -> bool {
        matches!(self, Error::Cancelled | Error::InvalidArg(_))
    }
}

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
