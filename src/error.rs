//! Error types shared across the crate.
//!
//! Mirrors the distinguished error kinds enumerated in the wire-protocol
//! contract: `Dial`, `Io`, `Timeout`, `Protocol`, `ServerError`,
//! `ServerLoading`, `TypeMismatch`, `MasterUnreachable`, `Exhausted`,
//! `Closed`.

use std::fmt;
use std::num::ParseIntError;
use std::str::Utf8Error;

/// The kind of failure a [`RedisError`] carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedisErrorKind {
    /// Failed to establish a TCP connection.
    Dial,
    /// A socket read or write failed for a reason other than a timeout.
    Io,
    /// A read or write exceeded its configured deadline.
    Timeout,
    /// The byte stream did not conform to RESP framing rules.
    Protocol,
    /// The server replied with a `-ERR ...`-style error line.
    ServerError,
    /// The server reported it is still loading its dataset (`-LOADING ...`).
    ServerLoading,
    /// A coercion was attempted against a `Reply` tag that does not support it.
    TypeMismatch,
    /// No sentinel in the configured set could name a master.
    MasterUnreachable,
    /// A pool with no overflow policy had nothing to hand out.
    Exhausted,
    /// The connection, pool, or client has already been closed.
    Closed,
}

impl fmt::Display for RedisErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RedisErrorKind::Dial => "dial",
            RedisErrorKind::Io => "io",
            RedisErrorKind::Timeout => "timeout",
            RedisErrorKind::Protocol => "protocol",
            RedisErrorKind::ServerError => "server error",
            RedisErrorKind::ServerLoading => "server loading",
            RedisErrorKind::TypeMismatch => "type mismatch",
            RedisErrorKind::MasterUnreachable => "master unreachable",
            RedisErrorKind::Exhausted => "exhausted",
            RedisErrorKind::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// The crate's single error type.
#[derive(Debug, thiserror::Error, Clone, PartialEq, Eq)]
#[error("{kind}: {message}")]
pub struct RedisError {
    pub kind: RedisErrorKind,
    pub message: String,
}

impl RedisError {
    pub fn new(kind: RedisErrorKind, message: impl Into<String>) -> Self {
        RedisError {
            kind,
            message: message.into(),
        }
    }

    pub fn dial(message: impl Into<String>) -> Self {
        Self::new(RedisErrorKind::Dial, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(RedisErrorKind::Protocol, message)
    }

    pub fn type_mismatch(message: impl Into<String>) -> Self {
        Self::new(RedisErrorKind::TypeMismatch, message)
    }

    pub fn closed() -> Self {
        Self::new(RedisErrorKind::Closed, "connection is closed")
    }

    pub fn exhausted() -> Self {
        Self::new(RedisErrorKind::Exhausted, "pool has no available connection")
    }

    /// Server error lines beginning with `LOADING` are a distinguished,
    /// retryable kind rather than a generic `ServerError`.
    pub fn from_server_error_line(line: impl Into<String>) -> Self {
        let line = line.into();
        if line.starts_with("LOADING") {
            RedisError::new(RedisErrorKind::ServerLoading, line)
        } else {
            RedisError::new(RedisErrorKind::ServerError, line)
        }
    }

    /// True iff this is a server error whose line begins with `READONLY`.
    pub fn is_readonly(&self) -> bool {
        self.kind == RedisErrorKind::ServerError && self.message.starts_with("READONLY")
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == RedisErrorKind::Timeout
    }
}

impl From<std::io::Error> for RedisError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::TimedOut || err.kind() == std::io::ErrorKind::WouldBlock {
            RedisError::new(RedisErrorKind::Timeout, err.to_string())
        } else {
            RedisError::new(RedisErrorKind::Io, err.to_string())
        }
    }
}

impl From<ParseIntError> for RedisError {
    fn from(err: ParseIntError) -> Self {
        RedisError::protocol(format!("invalid integer: {err}"))
    }
}

impl From<Utf8Error> for RedisError {
    fn from(err: Utf8Error) -> Self {
        RedisError::protocol(format!("invalid utf-8: {err}"))
    }
}

pub type RedisResult<T> = Result<T, RedisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_prefix_maps_to_server_loading() {
        let err = RedisError::from_server_error_line("LOADING Redis is loading");
        assert_eq!(err.kind, RedisErrorKind::ServerLoading);
    }

    #[test]
    fn readonly_predicate() {
        let err = RedisError::from_server_error_line("READONLY You can't write");
        assert!(err.is_readonly());
        let err = RedisError::from_server_error_line("ERR something else");
        assert!(!err.is_readonly());
    }

    #[test]
    fn io_timeout_maps_to_timeout_kind() {
        let io_err = std::io::Error::new(std::io::ErrorKind::TimedOut, "deadline exceeded");
        let err: RedisError = io_err.into();
        assert_eq!(err.kind, RedisErrorKind::Timeout);
    }
}
