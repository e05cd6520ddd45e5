// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types.
//!
//! Two layers of failure exist:
//!
//! - [`StreamError`] is what an asynchronous stream reports when one of its
//!   operations fails. Endpoints turn it into an error-queue message, so it
//!   reaches the caller inside [`BioError::Fatal`].
//! - [`BioError`] is what the caller-facing surface of an endpoint chain
//!   returns. A would-block is represented as [`BioError::WouldBlock`] with
//!   the direction the chain is waiting on; it is a retry signal, not a
//!   failure.
//!
//! Broken internal contracts (a second operation issued into an occupied
//! slot, a retry without a direction) are not represented here: they panic.

use std::fmt;
use std::io;

// ============================================================================
// Stream errors
// ============================================================================

/// Failure reported by an asynchronous stream operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StreamError {
    kind: io::ErrorKind,
    message: String,
}

impl StreamError {
    /// Create a stream error with an explicit kind.
    pub fn new(kind: io::ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Create a stream error of kind [`io::ErrorKind::Other`].
    pub fn other(message: impl Into<String>) -> Self {
        Self::new(io::ErrorKind::Other, message)
    }

    /// The peer or the stream itself went away.
    pub fn closed() -> Self {
        Self::new(io::ErrorKind::BrokenPipe, "stream closed")
    }

    /// Error kind.
    pub fn kind(&self) -> io::ErrorKind {
        self.kind
    }

    /// Human readable description.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.message, self.kind)
    }
}

impl std::error::Error for StreamError {}

impl From<io::Error> for StreamError {
    fn from(e: io::Error) -> Self {
        Self::new(e.kind(), e.to_string())
    }
}

impl From<StreamError> for io::Error {
    fn from(e: StreamError) -> Self {
        io::Error::new(e.kind, e.message)
    }
}

/// Result of an asynchronous stream operation.
pub type StreamResult<T> = std::result::Result<T, StreamError>;

// ============================================================================
// Retry reasons
// ============================================================================

/// Direction an endpoint chain is waiting on after a would-block.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RetryReason {
    /// Retry once the transport can plausibly deliver more bytes.
    Read,
    /// Retry once the transport can plausibly accept more bytes.
    Write,
    /// Retry of a control operation (flush).
    IoSpecial,
}

impl fmt::Display for RetryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RetryReason::Read => "READ",
            RetryReason::Write => "WRITE",
            RetryReason::IoSpecial => "IO_SPECIAL",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Caller-facing errors
// ============================================================================

/// Errors returned by endpoint chain operations.
#[derive(Debug)]
pub enum BioError {
    /// The operation could not complete yet; retry it later.
    WouldBlock(RetryReason),
    /// The chain failed; the message is the drained engine error queue.
    Fatal(String),
    /// The TLS engine rejected its input or configuration.
    Tls(rustls::Error),
    /// Local I/O failure (file loading and similar).
    Io(io::Error),
    /// Invalid configuration value.
    Config(String),
}

impl BioError {
    /// Check whether this is a retry signal rather than a failure.
    pub fn is_would_block(&self) -> bool {
        matches!(self, BioError::WouldBlock(_))
    }

    /// Direction to wait on, if this is a retry signal.
    pub fn retry_reason(&self) -> Option<RetryReason> {
        match self {
            BioError::WouldBlock(reason) => Some(*reason),
            _ => None,
        }
    }
}

impl fmt::Display for BioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BioError::WouldBlock(reason) => write!(f, "Operation would block ({})", reason),
            BioError::Fatal(msg) if msg.is_empty() => write!(f, "Endpoint failure"),
            BioError::Fatal(msg) => write!(f, "Endpoint failure: {}", msg),
            BioError::Tls(e) => write!(f, "TLS error: {}", e),
            BioError::Io(e) => write!(f, "I/O error: {}", e),
            BioError::Config(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for BioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BioError::Tls(e) => Some(e),
            BioError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<rustls::Error> for BioError {
    fn from(e: rustls::Error) -> Self {
        BioError::Tls(e)
    }
}

impl From<io::Error> for BioError {
    fn from(e: io::Error) -> Self {
        BioError::Io(e)
    }
}

/// Result type for endpoint chain operations.
pub type Result<T> = std::result::Result<T, BioError>;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_error_from_io() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionReset, "reset by peer");
        let err: StreamError = io_err.into();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
        assert!(err.message().contains("reset by peer"));
    }

    #[test]
    fn test_stream_error_back_to_io() {
        let err = StreamError::closed();
        let io_err: io::Error = err.into();
        assert_eq!(io_err.kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_would_block_is_not_failure() {
        let err = BioError::WouldBlock(RetryReason::Write);
        assert!(err.is_would_block());
        assert_eq!(err.retry_reason(), Some(RetryReason::Write));
        assert!(err.to_string().contains("WRITE"));

        let err = BioError::Fatal("boom".to_string());
        assert!(!err.is_would_block());
        assert_eq!(err.retry_reason(), None);
    }

    #[test]
    fn test_error_display() {
        let err = BioError::Config("pair_buffer_size must be > 0".to_string());
        assert!(err.to_string().contains("Invalid configuration"));

        let err = BioError::Fatal(String::new());
        assert_eq!(err.to_string(), "Endpoint failure");
    }
}
