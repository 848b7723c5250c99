use hsk_core::ErrorKind;
use thiserror::Error;

/// Errors from the Noise transport (spec §4.3). All are fatal to the
/// connection.
#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("handshake act had wrong size: expected {expected}, got {got}")]
    WrongActSize { expected: usize, got: usize },
    #[error("handshake MAC mismatch")]
    MacMismatch,
    #[error("failed to decode peer's ephemeral point")]
    BadPointDecode,
    #[error("handshake step out of order")]
    OutOfOrder,
}

/// Errors from sealed application frames (spec §4.3).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("AEAD tag mismatch")]
    AuthError,
    #[error("decoded length {0} exceeds MAX_MESSAGE_SIZE")]
    Oversize(usize),
    #[error(transparent)]
    Handshake(#[from] HandshakeError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wire-codec / protocol-level errors (spec §4.2/§4.4).
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("bad magic in frame header")]
    BadMagic,
    #[error("payload of {0} bytes exceeds MAX_MESSAGE_SIZE")]
    Oversize(usize),
    #[error("malformed packet: {0}")]
    Malformed(String),
    #[error("duplicate version packet")]
    DuplicateVersion,
    #[error("self connection detected")]
    SelfConnect(u64),
    #[error("peer disconnected: {0:?}")]
    Disconnect(DisconnectReason),
    #[error("request timed out")]
    Timeout,
    #[error("too many pending requests of this kind")]
    Resource,
    #[error("session expired")]
    Expired,
    #[error("unknown or unsupported protocol")]
    BadProtocol,
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<HandshakeError> for NetworkError {
    fn from(e: HandshakeError) -> NetworkError {
        NetworkError::Transport(TransportError::Handshake(e))
    }
}

impl NetworkError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            NetworkError::BadMagic
            | NetworkError::Oversize(_)
            | NetworkError::Malformed(_)
            | NetworkError::DuplicateVersion
            | NetworkError::SelfConnect(_)
            | NetworkError::BadProtocol => ErrorKind::Protocol,
            NetworkError::Disconnect(_) => ErrorKind::Protocol,
            NetworkError::Timeout => ErrorKind::Timeout,
            NetworkError::Resource => ErrorKind::Resource,
            NetworkError::Expired => ErrorKind::Resource,
            NetworkError::Transport(_) => ErrorKind::Protocol,
            NetworkError::Io(_) => ErrorKind::Io,
        }
    }
}

/// Reasons a peer gave (or we gave) for a `disconnect`/ban.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Requested,
    UselessPeer,
    BadProtocol,
    PingTimeout,
    Banned,
}

impl DisconnectReason {
    pub fn from_u8(v: u8) -> DisconnectReason {
        match v {
            0 => DisconnectReason::Requested,
            1 => DisconnectReason::UselessPeer,
            2 => DisconnectReason::BadProtocol,
            3 => DisconnectReason::PingTimeout,
            _ => DisconnectReason::Banned,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            DisconnectReason::Requested => 0,
            DisconnectReason::UselessPeer => 1,
            DisconnectReason::BadProtocol => 2,
            DisconnectReason::PingTimeout => 3,
            DisconnectReason::Banned => 4,
        }
    }
}

pub type Result<T> = std::result::Result<T, NetworkError>;
