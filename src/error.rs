//! Crate-wide error kinds.
//!
//! A single enum carries every failure this system can produce, from a
//! malformed [`crate::path::Path`] string to a dropped TCP connection. The
//! RPC runtime ([`crate::rpc`]) transports [`DfsError`] values transparently
//! between peers and only ever constructs [`DfsError::RpcFailure`] itself;
//! every other variant is raised by naming/storage service code.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, DfsError>;

/// The seven error kinds this system can produce.
#[derive(Error, Debug)]
pub enum DfsError {
    /// Transport, marshaling, or dispatch failure in the RPC runtime.
    #[error("rpc failure: {0}")]
    RpcFailure(String),

    /// A path does not exist, or exists but has the wrong kind.
    #[error("not found: {0}")]
    NotFound(String),

    /// Invalid offset/length on a read or write.
    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    /// The host filesystem rejected an operation.
    #[error("io failure: {0}")]
    IoFailure(#[from] std::io::Error),

    /// A required argument was null/absent.
    #[error("null argument: {0}")]
    NullArgument(String),

    /// Duplicate registration, empty registry on create, or double start.
    #[error("illegal state: {0}")]
    IllegalState(String),

    /// A malformed path string or path component.
    #[error("illegal argument: {0}")]
    IllegalArgument(String),
}

impl DfsError {
    /// True for the kind the RPC layer alone is allowed to construct.
    pub fn is_rpc_failure(&self) -> bool {
        matches!(self, DfsError::RpcFailure(_))
    }
}
