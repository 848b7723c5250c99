use hsk_core::ErrorKind;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("unknown peer id {0}")]
    UnknownPeer(u64),
    #[error("no loader peer available")]
    NoLoader,
    #[error(transparent)]
    Network(#[from] hsk_net::NetworkError),
    #[error(transparent)]
    Store(#[from] hsk_store::StoreError),
    #[error("broadcast timed out")]
    BroadcastTimeout,
    #[error("broadcast rejected")]
    BroadcastRejected,
    #[error("proof verification failed")]
    BadProof,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PoolError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PoolError::UnknownPeer(_) | PoolError::NoLoader => ErrorKind::Protocol,
            PoolError::Network(e) => e.kind(),
            PoolError::Store(_) => ErrorKind::Storage,
            PoolError::BroadcastTimeout => ErrorKind::Timeout,
            PoolError::BroadcastRejected => ErrorKind::InvalidData,
            PoolError::BadProof => ErrorKind::InvalidData,
            PoolError::Io(_) => ErrorKind::Io,
        }
    }
}

pub type Result<T> = std::result::Result<T, PoolError>;
