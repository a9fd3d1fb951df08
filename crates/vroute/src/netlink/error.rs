//! Error types for route encoding, validation and kernel requests.

use std::io;

/// Result type for route operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or submitting route requests.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error from socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Kernel returned an error code.
    #[error("kernel error: {message} (errno {errno})")]
    Kernel {
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// Kernel error with operation context.
    #[error("{operation}: {message} (errno {errno})")]
    KernelWithContext {
        /// The operation that failed.
        operation: String,
        /// The errno value from the kernel.
        errno: i32,
        /// Human-readable error message.
        message: String,
    },

    /// An attribute did not fit in its bounded buffer.
    #[error("attribute buffer exhausted: {needed} bytes needed, {remaining} remaining")]
    BufferExhausted {
        /// Aligned size of the rejected append.
        needed: usize,
        /// Bytes left before the limit.
        remaining: usize,
    },

    /// The route specification was rejected.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Message was truncated.
    #[error("message truncated: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Expected message length.
        expected: usize,
        /// Actual bytes received.
        actual: usize,
    },

    /// Invalid message format.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Invalid attribute format.
    #[error("invalid attribute: {0}")]
    InvalidAttribute(String),
}

/// Reasons a route block is rejected while parsing or encoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// An address disagrees with the family already established for the route.
    #[error("cannot mix IPv4 and IPv6 addresses in one route ({clause} {value})")]
    FamilyMismatch {
        /// Clause carrying the address.
        clause: &'static str,
        /// Offending token.
        value: String,
    },

    /// A clause only exists for one address family.
    #[error("{clause} is only valid for {family} routes")]
    FamilyRestricted {
        /// Clause keyword.
        clause: &'static str,
        /// The only family the clause applies to.
        family: &'static str,
    },

    /// A token that is neither a keyword nor a destination.
    #[error("unknown route keyword {0}")]
    UnknownKeyword(String),

    /// A clause appeared at the end of the block without its argument.
    #[error("missing value for {0}")]
    MissingValue(&'static str),

    /// A clause argument failed to parse.
    #[error("invalid {clause} value {value}")]
    InvalidValue {
        /// Clause keyword.
        clause: &'static str,
        /// Offending token.
        value: String,
    },

    /// A numeric argument outside its permitted range.
    #[error("{clause} value {value} out of range (maximum {max})")]
    OutOfRange {
        /// Clause keyword.
        clause: &'static str,
        /// Offending token.
        value: String,
        /// Largest accepted value.
        max: u64,
    },

    /// A symbolic name missing from its lookup table.
    #[error("unknown {kind} {name}")]
    UnknownName {
        /// Table the name was looked up in.
        kind: &'static str,
        /// Offending name.
        name: String,
    },

    /// Interface name with no kernel index.
    #[error("unknown interface {0}")]
    UnknownInterface(String),

    /// A clause the running kernel (or this crate) cannot honour.
    #[error("{0} is not supported")]
    Unsupported(&'static str),

    /// Tokens left over after the next-hop list.
    #[error("route has trailing tokens starting at {0}")]
    TrailingTokens(String),

    /// Clauses that contradict each other.
    #[error("{0}")]
    Conflict(&'static str),
}

impl Error {
    /// Create a kernel error from an errno value.
    pub fn from_errno(errno: i32) -> Self {
        let message = io::Error::from_raw_os_error(-errno).to_string();
        Self::Kernel {
            errno: -errno,
            message,
        }
    }

    /// Add context to this error.
    ///
    /// Wraps kernel errors with operation context. Other errors are returned unchanged.
    pub fn with_context(self, operation: impl Into<String>) -> Self {
        match self {
            Self::Kernel { errno, message } => Self::KernelWithContext {
                operation: operation.into(),
                errno,
                message,
            },
            other => other,
        }
    }

    /// Check whether the kernel reported that the route does not exist.
    pub fn is_route_gone(&self) -> bool {
        matches!(self.errno(), Some(libc::ENOENT | libc::ESRCH))
    }

    /// Check if this is a permission error (EPERM, EACCES).
    pub fn is_permission_denied(&self) -> bool {
        matches!(self.errno(), Some(libc::EPERM | libc::EACCES))
    }

    /// Get the errno value if this is a kernel error.
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Kernel { errno, .. } | Self::KernelWithContext { errno, .. } => Some(*errno),
            _ => None,
        }
    }
}
