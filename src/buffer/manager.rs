// Fixed-size buffer pool.
//
// One mutex guards the pool, the replacement policy's bookkeeping, and the
// available count; one condvar wakes pin waiters. A pin that cannot find a
// victim waits up to the configured timeout, re-attempting on every wake,
// and fails only after a re-attempt past the deadline also comes up empty.
// A failed pin changes no pin counts, so a caller that saw the timeout
// error never also holds the buffer.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::warn;

use crate::buffer::eviction::ReplacementPolicy;
use crate::buffer::frame::Buffer;
use crate::buffer::BufferId;
use crate::error::{DbError, Result};
use crate::log::LogManager;
use crate::storage::{BlockId, FileManager};
use crate::transaction::TxNum;

struct Pool {
    buffers: Vec<Buffer>,
    available: usize,
    policy: Box<dyn ReplacementPolicy + Send>,
}

pub struct BufferManager {
    pool: Mutex<Pool>,
    waiters: Condvar,
    pin_timeout: Duration,
}

impl BufferManager {
    pub fn new(
        file_manager: Arc<FileManager>,
        log_manager: Arc<LogManager>,
        buffer_count: usize,
        mut policy: Box<dyn ReplacementPolicy + Send>,
        pin_timeout: Duration,
    ) -> Self {
        let buffers = (0..buffer_count)
            .map(|_| Buffer::new(Arc::clone(&file_manager), Arc::clone(&log_manager)))
            .collect();
        policy.initialize(buffer_count);

        Self {
            pool: Mutex::new(Pool {
                buffers,
                available: buffer_count,
                policy,
            }),
            waiters: Condvar::new(),
            pin_timeout,
        }
    }

    /// Number of currently unpinned buffers.
    pub fn available(&self) -> usize {
        self.pool.lock().available
    }

    /// Pins `block` into a buffer, waiting up to the pin timeout for one to
    /// free up. Fails with `BufferAbort` when the pool stays exhausted.
    pub fn pin(&self, block: &BlockId) -> Result<BufferId> {
        let deadline = Instant::now() + self.pin_timeout;
        let mut pool = self.pool.lock();
        loop {
            if let Some(id) = Self::try_to_pin(&mut pool, block)? {
                return Ok(id);
            }
            let now = Instant::now();
            if now >= deadline {
                warn!(%block, "buffer pool exhausted, aborting pin");
                return Err(DbError::BufferAbort(block.clone()));
            }
            self.waiters.wait_for(&mut pool, deadline - now);
        }
    }

    /// Releases one pin on `id`, waking waiters when it becomes free.
    pub fn unpin(&self, id: BufferId) {
        let mut pool = self.pool.lock();
        pool.buffers[id].unpin();
        if !pool.buffers[id].is_pinned() {
            pool.available += 1;
            pool.policy.unpin_buffer(id);
            self.waiters.notify_all();
        }
    }

    /// Flushes every dirty buffer modified by `txnum`.
    pub fn flush_all(&self, txnum: TxNum) -> Result<()> {
        let mut pool = self.pool.lock();
        for buffer in pool.buffers.iter_mut() {
            if buffer.modifying_tx() == Some(txnum) {
                buffer.flush()?;
            }
        }
        Ok(())
    }

    /// Runs `f` with exclusive access to buffer `id`.
    pub fn with_buffer<R>(&self, id: BufferId, f: impl FnOnce(&mut Buffer) -> R) -> R {
        let mut pool = self.pool.lock();
        f(&mut pool.buffers[id])
    }

    fn try_to_pin(pool: &mut Pool, block: &BlockId) -> Result<Option<BufferId>> {
        let existing = pool
            .buffers
            .iter()
            .position(|b| b.block() == Some(block));
        let id = match existing {
            Some(id) => id,
            None => {
                let Pool {
                    buffers, policy, ..
                } = pool;
                match policy.choose_unpinned(buffers) {
                    Some(id) => {
                        if let Err(e) = buffers[id].assign_to_block(block.clone()) {
                            // The victim stays unpinned; hand it back.
                            policy.unpin_buffer(id);
                            return Err(e);
                        }
                        id
                    }
                    None => return Ok(None),
                }
            }
        };

        if !pool.buffers[id].is_pinned() {
            pool.available -= 1;
        }
        pool.buffers[id].pin();
        pool.policy.pin_buffer(id);
        Ok(Some(id))
    }
}
