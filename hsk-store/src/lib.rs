//! Content-addressed, append-only object store for BLOCK/UNDO/MERKLE
//! payloads, backed by a rocksdb index (spec §4.1).

mod batch;
mod error;
mod hasher;
mod keys;
mod layout;
mod options;
mod records;
mod store;

pub use batch::WriteBatch;
pub use error::{Result, StoreError};
pub use hasher::{HeaderHasher, Sha256HeaderHasher};
pub use options::StoreOptions;
pub use records::{BlockRecord, FileRecord};
pub use store::BlockStore;
