use hsk_core::ErrorKind;
use thiserror::Error;

/// BlockStore-specific error enum. `kind()` maps each variant onto the
/// spec §7 taxonomy so callers outside this crate can branch generically.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("block already indexed")]
    AlreadyExists,
    #[error("block not found")]
    NotFound,
    #[error("read out of bounds")]
    OutOfBounds,
    #[error("object of {0} bytes exceeds max file length")]
    TooLarge(usize),
    #[error("a write for this object type is already in flight")]
    AlreadyWriting,
    #[error("index inconsistency detected, re-scan required: {0}")]
    Storage(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("index error: {0}")]
    Index(String),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::AlreadyExists => ErrorKind::Protocol,
            StoreError::NotFound => ErrorKind::Protocol,
            StoreError::OutOfBounds => ErrorKind::Protocol,
            StoreError::TooLarge(_) => ErrorKind::Resource,
            StoreError::AlreadyWriting => ErrorKind::Resource,
            StoreError::Storage(_) => ErrorKind::Storage,
            StoreError::Io(_) => ErrorKind::Io,
            StoreError::Index(_) => ErrorKind::Storage,
        }
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
