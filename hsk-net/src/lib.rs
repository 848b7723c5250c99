//! Wire framing, the Noise-XK encrypted transport, packet payload codecs,
//! rolling dedup filters, and the per-connection session state machine
//! (spec §4.2-§4.4).

mod bloom;
mod error;
mod messages;
mod noise;
mod session;
mod wire;

pub use bloom::RollingFilter;
pub use error::{DisconnectReason, HandshakeError, NetworkError, Result, TransportError};
pub use messages::{
    AddrPayload, BlockTxnPayload, CmpctBlockPayload, FeeFilterPayload, FilterAddPayload,
    FilterLoadPayload, GetBlockTxnPayload, GetBlocksPayload, GetProofPayload, HeadersPayload,
    InvPayload, Payload, PingPongPayload, ProofPayload, RejectPayload, SendCmpctPayload,
    VersionPayload,
};
pub use noise::{CipherState, HandshakeState};
pub use session::{Action, PeerSession, SessionConfig};
pub use wire::{encode as encode_frame, Frame, WireCodec};
