// Per-transaction concurrency manager: strict two-phase locking.
//
// Growing phase only while the transaction runs; every lock is released in
// one shot at commit or rollback. Exclusive locks are reached by promoting
// an already-held shared lock, which keeps promotion requests from racing
// each other in the table.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::storage::BlockId;
use crate::transaction::lock_table::LockTable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LockKind {
    Shared,
    Exclusive,
}

pub struct ConcurrencyManager {
    lock_table: Arc<LockTable>,
    locks: HashMap<BlockId, LockKind>,
}

impl ConcurrencyManager {
    pub fn new(lock_table: Arc<LockTable>) -> Self {
        Self {
            lock_table,
            locks: HashMap::new(),
        }
    }

    /// Ensures this transaction holds at least a shared lock on `block`.
    pub fn s_lock(&mut self, block: &BlockId) -> Result<()> {
        if !self.locks.contains_key(block) {
            self.lock_table.s_lock(block)?;
            self.locks.insert(block.clone(), LockKind::Shared);
        }
        Ok(())
    }

    /// Ensures this transaction holds the exclusive lock on `block`,
    /// promoting a shared hold if necessary.
    pub fn x_lock(&mut self, block: &BlockId) -> Result<()> {
        if self.locks.get(block) != Some(&LockKind::Exclusive) {
            self.s_lock(block)?;
            self.lock_table.x_lock(block)?;
            self.locks.insert(block.clone(), LockKind::Exclusive);
        }
        Ok(())
    }

    /// Releases every held lock exactly once.
    pub fn release(&mut self) {
        for block in self.locks.keys() {
            self.lock_table.unlock(block);
        }
        self.locks.clear();
    }
}
