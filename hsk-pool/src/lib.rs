//! Multi-peer coordination (spec §4): outbound filling, loader election,
//! checkpoint/getblocks sync, inventory routing with process-wide
//! request dedup, compact-block reconstruction, broadcast lifecycle,
//! and name-proof resolution. The socket layer and the `Chain`/`Mempool`
//! collaborators live outside this crate; `Pool` only turns decoded
//! payloads and timer ticks into actions.

pub mod broadcast;
pub mod chain;
pub mod compact;
pub mod error;
pub mod mempool;
pub mod names;
pub mod options;
pub mod outbound;
pub mod peer;
pub mod pool;
pub mod requests;
pub mod sync;

pub use broadcast::{BroadcastOutcome, BroadcastTracker};
pub use chain::{Chain, ChainEntry, ChainEvent};
pub use compact::{derive_siphash_keys, short_id, PrefilledTx, Reassembler};
pub use error::{PoolError, Result};
pub use mempool::{Mempool, MempoolEvent};
pub use names::{NameResolver, ProofVerifier};
pub use options::PoolOptions;
pub use peer::{CompactMode, PeerHandle, PeerId, PeerSlab};
pub use pool::{Pool, PoolAction};
pub use requests::{InFlight, RequestMap, SeenSet};
pub use sync::{SyncMode, SyncState};
