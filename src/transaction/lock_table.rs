// Global shared/exclusive lock table keyed by block.
//
// Lock state per block is a single integer: a positive value counts shared
// holders, -1 marks an exclusive holder. Waiters sleep on one condvar in
// one-second quanta and re-check on every wake; a request whose cumulative
// wait passes the budget aborts. Deadlocks are broken by these timeouts
// rather than detected. A timed-out waiter never touched the map, so no
// cleanup is needed on the error path.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use crate::error::{DbError, Result};
use crate::storage::BlockId;

const WAIT_QUANTUM: Duration = Duration::from_secs(1);

pub struct LockTable {
    locks: Mutex<HashMap<BlockId, i32>>,
    waiters: Condvar,
    timeout: Duration,
}

impl LockTable {
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
            waiters: Condvar::new(),
            timeout,
        }
    }

    /// Acquires a shared lock on `block`, waiting out any exclusive holder.
    pub fn s_lock(&self, block: &BlockId) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        let mut locks = self.locks.lock();
        while locks.get(block).copied() == Some(-1) {
            self.wait(&mut locks, deadline, block)?;
        }
        *locks.entry(block.clone()).or_insert(0) += 1;
        Ok(())
    }

    /// Upgrades to an exclusive lock on `block`.
    ///
    /// The caller must already hold a shared lock (the concurrency manager
    /// guarantees this), so waiting ends once it is the sole holder.
    pub fn x_lock(&self, block: &BlockId) -> Result<()> {
        let deadline = Instant::now() + self.timeout;
        let mut locks = self.locks.lock();
        while locks.get(block).copied().unwrap_or(0) > 1 {
            self.wait(&mut locks, deadline, block)?;
        }
        locks.insert(block.clone(), -1);
        Ok(())
    }

    /// Releases one hold on `block` and wakes all waiters.
    pub fn unlock(&self, block: &BlockId) {
        let mut locks = self.locks.lock();
        match locks.get_mut(block) {
            Some(value) if *value > 1 => *value -= 1,
            Some(_) => {
                locks.remove(block);
            }
            None => {}
        }
        self.waiters.notify_all();
    }

    /// Number of blocks with live lock entries (test observability).
    pub fn entry_count(&self) -> usize {
        self.locks.lock().len()
    }

    fn wait(
        &self,
        locks: &mut parking_lot::MutexGuard<'_, HashMap<BlockId, i32>>,
        deadline: Instant,
        block: &BlockId,
    ) -> Result<()> {
        let now = Instant::now();
        if now >= deadline {
            warn!(%block, "lock wait budget exhausted");
            return Err(DbError::LockAbort(block.clone()));
        }
        let quantum = WAIT_QUANTUM.min(deadline - now);
        self.waiters.wait_for(locks, quantum);
        Ok(())
    }
}
