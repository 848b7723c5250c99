use std::io;
use thiserror::Error;

/// The error-kind taxonomy of spec §7. Every subsystem's own error enum
/// carries one of these as its outermost discriminant so callers can make
/// uniform decisions (fatal-to-connection, ban-score bump, re-scan, ...)
/// without matching on subsystem-specific variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad magic, oversize payload, malformed packet, duplicate handshake.
    /// Always fatal to the connection.
    Protocol,
    /// Consensus/verify failure reported by chain or mempool.
    InvalidData,
    /// A request or handshake step is overdue.
    Timeout,
    /// Too many pending items, oversize buffers, etc.
    Resource,
    /// Socket or disk I/O failure.
    Io,
    /// Index inconsistency detected at open; triggers a re-scan.
    Storage,
}

/// A generic, crate-wide error carrying one of the kinds above plus a
/// human-readable cause. Subsystem crates wrap this (or compose their own
/// `thiserror` enum that exposes `.kind()`) rather than reinventing the
/// taxonomy.
#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Error {
        Error { kind, message: message.into() }
    }

    pub fn protocol(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Protocol, message)
    }

    pub fn timeout(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Timeout, message)
    }

    pub fn resource(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Resource, message)
    }

    pub fn storage(message: impl Into<String>) -> Error {
        Error::new(ErrorKind::Storage, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Error {
        Error::new(ErrorKind::Io, e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
