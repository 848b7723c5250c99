use crate::error::Result;
use crate::records::BlockRecord;
use crate::store::BlockStore;
use hsk_core::{BlockType, Hash};

enum Op {
    Write { ty: BlockType, hash: Hash, data: Vec<u8> },
    Prune { ty: BlockType, hash: Hash },
}

/// A queue of writes and prunes applied against a `BlockStore` in two
/// phases (spec §4.1: "two-phase `commit_writes()`/`commit_prunes()`/
/// `commit()`"). Batches are best-effort, not atomic across files, mirroring
/// the source.
pub struct WriteBatch<'s> {
    store: &'s BlockStore,
    ops: Vec<Op>,
}

impl<'s> WriteBatch<'s> {
    pub(crate) fn new(store: &'s BlockStore) -> WriteBatch<'s> {
        WriteBatch { store, ops: Vec::new() }
    }

    pub fn write_block(&mut self, ty: BlockType, hash: Hash, data: Vec<u8>) {
        self.ops.push(Op::Write { ty, hash, data });
    }

    pub fn prune_block(&mut self, ty: BlockType, hash: Hash) {
        self.ops.push(Op::Prune { ty, hash });
    }

    /// Applies only the queued writes, in enqueue order.
    pub fn commit_writes(&mut self) -> Result<Vec<BlockRecord>> {
        let writes = self.drain_matching(|op| matches!(op, Op::Write { .. }));
        let mut records = Vec::with_capacity(writes.len());
        for op in writes {
            if let Op::Write { ty, hash, data } = op {
                records.push(self.store.write_block(ty, hash, &data)?);
            }
        }
        Ok(records)
    }

    fn drain_matching<F>(&mut self, mut keep: F) -> Vec<Op>
    where
        F: FnMut(&Op) -> bool,
    {
        let mut matched = Vec::new();
        let mut rest = Vec::new();
        for op in self.ops.drain(..) {
            if keep(&op) {
                matched.push(op);
            } else {
                rest.push(op);
            }
        }
        self.ops = rest;
        matched
    }

    /// Applies only the queued prunes, in enqueue order.
    pub fn commit_prunes(&mut self) -> Result<usize> {
        let prunes = self.drain_matching(|op| matches!(op, Op::Prune { .. }));
        let mut pruned = 0;
        for op in prunes {
            if let Op::Prune { ty, hash } = op {
                if self.store.prune_block(ty, &hash)? {
                    pruned += 1;
                }
            }
        }
        Ok(pruned)
    }

    /// Applies every queued operation in enqueue order.
    pub fn commit(&mut self) -> Result<()> {
        for op in self.ops.drain(..) {
            match op {
                Op::Write { ty, hash, data } => {
                    self.store.write_block(ty, hash, &data)?;
                }
                Op::Prune { ty, hash } => {
                    self.store.prune_block(ty, &hash)?;
                }
            }
        }
        Ok(())
    }
}
