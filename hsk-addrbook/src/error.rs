use hsk_core::ErrorKind;
use thiserror::Error;

/// AddrBook errors. Persistence failures map to `ErrorKind::Io`/`Storage`
/// the same way the blockstore's `StoreError` does (spec §7).
#[derive(Debug, Error)]
pub enum AddrBookError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed addrbook file: {0}")]
    Malformed(String),
}

impl AddrBookError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AddrBookError::Io(_) => ErrorKind::Io,
            AddrBookError::Malformed(_) => ErrorKind::Storage,
        }
    }
}

impl From<serde_json::Error> for AddrBookError {
    fn from(e: serde_json::Error) -> AddrBookError {
        AddrBookError::Malformed(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AddrBookError>;
