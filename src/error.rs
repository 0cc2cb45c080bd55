//! Crate error type.
//!
//! Errors are plain values. Frame unpacking errors are recoverable at the
//! connection layer; compression errors poison the originating context and
//! every later call on it fails with the same code.

/// Top-level crate error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Payload length is wrong for the frame type. The codec itself is
    /// stateless; the caller may reject the frame and carry on.
    InvalidFrame,
    /// Header compression failed: malformed block, capacity exhausted, or the
    /// context was already poisoned. The context is unusable from here on and
    /// the connection must be torn down.
    HeaderComp,
    /// A header name or value exceeds `MAX_HD_VALUE_LENGTH`.
    InvalidArgument,
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::InvalidFrame => write!(f, "invalid frame"),
            Error::HeaderComp => write!(f, "header compression error"),
            Error::InvalidArgument => write!(f, "invalid argument"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
