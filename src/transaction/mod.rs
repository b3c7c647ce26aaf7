// Transactions over the storage, log, and buffer subsystems.
//
// A transaction is the sole entry point for the record and query layers:
// typed page reads and writes under strict two-phase locks, file growth
// behind the end-of-file sentinel, and commit/rollback/recover lifecycle.

pub mod buffer_list;
pub mod concurrency;
pub mod lock_table;
pub mod record;
pub mod recovery;

pub use concurrency::ConcurrencyManager;
pub use lock_table::LockTable;
pub use record::LogRecord;
pub use recovery::RecoveryManager;

use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::buffer::BufferManager;
use crate::error::{DbError, Result};
use crate::log::{LogManager, NO_LSN};
use crate::storage::{BlockId, FileManager};
use crate::transaction::buffer_list::BufferList;

/// Transaction number: unique and monotonic for the life of the process.
pub type TxNum = i32;

static NEXT_TX_NUM: AtomicI32 = AtomicI32::new(0);

fn next_tx_number() -> TxNum {
    NEXT_TX_NUM.fetch_add(1, Ordering::SeqCst) + 1
}

pub struct Transaction {
    file_manager: Arc<FileManager>,
    buffer_manager: Arc<BufferManager>,
    recovery: RecoveryManager,
    concurrency: ConcurrencyManager,
    buffers: BufferList,
    txnum: TxNum,
}

impl Transaction {
    pub(crate) fn new(
        file_manager: Arc<FileManager>,
        log_manager: Arc<LogManager>,
        buffer_manager: Arc<BufferManager>,
        lock_table: Arc<LockTable>,
    ) -> Result<Self> {
        let txnum = next_tx_number();
        let recovery =
            RecoveryManager::new(log_manager, Arc::clone(&buffer_manager), txnum)?;
        debug!(txnum, "transaction started");

        Ok(Self {
            file_manager,
            buffer_manager: Arc::clone(&buffer_manager),
            recovery,
            concurrency: ConcurrencyManager::new(lock_table),
            buffers: BufferList::new(buffer_manager),
            txnum,
        })
    }

    pub fn tx_num(&self) -> TxNum {
        self.txnum
    }

    pub fn block_size(&self) -> usize {
        self.file_manager.block_size()
    }

    pub fn available_buffers(&self) -> usize {
        self.buffer_manager.available()
    }

    /// Pins `block` for the duration of this transaction (or until an
    /// explicit unpin).
    pub fn pin(&mut self, block: &BlockId) -> Result<()> {
        self.buffers.pin(block)
    }

    /// Releases one of this transaction's pins on `block`.
    pub fn unpin(&mut self, block: &BlockId) {
        self.buffers.unpin(block);
    }

    /// Commits: forces this transaction's work to disk, then releases all
    /// locks and pins. Locks and pins are released even if the flush fails.
    pub fn commit(mut self) -> Result<()> {
        let result = self.recovery.commit();
        self.concurrency.release();
        self.buffers.unpin_all();
        result
    }

    /// Rolls back: undoes this transaction's logged changes, then releases
    /// all locks and pins.
    pub fn rollback(mut self) -> Result<()> {
        let recovery = self.recovery.clone();
        let result = recovery.rollback(&mut self);
        self.concurrency.release();
        self.buffers.unpin_all();
        result
    }

    /// Rolls back every transaction left unfinished by a previous process
    /// and writes a quiescent checkpoint. Called once at startup, before
    /// user transactions begin.
    pub fn recover(mut self) -> Result<()> {
        let recovery = self.recovery.clone();
        let flush = self.buffer_manager.flush_all(self.txnum);
        let result = flush.and_then(|_| recovery.recover(&mut self));
        self.concurrency.release();
        self.buffers.unpin_all();
        result
    }

    pub fn get_int(&mut self, block: &BlockId, offset: usize) -> Result<i32> {
        self.concurrency.s_lock(block)?;
        let id = self.pinned_buffer(block)?;
        self.buffer_manager
            .with_buffer(id, |buf| buf.contents().get_int(offset))
    }

    pub fn get_long(&mut self, block: &BlockId, offset: usize) -> Result<i64> {
        self.concurrency.s_lock(block)?;
        let id = self.pinned_buffer(block)?;
        self.buffer_manager
            .with_buffer(id, |buf| buf.contents().get_long(offset))
    }

    pub fn get_short(&mut self, block: &BlockId, offset: usize) -> Result<i16> {
        self.concurrency.s_lock(block)?;
        let id = self.pinned_buffer(block)?;
        self.buffer_manager
            .with_buffer(id, |buf| buf.contents().get_short(offset))
    }

    pub fn get_string(&mut self, block: &BlockId, offset: usize) -> Result<String> {
        self.concurrency.s_lock(block)?;
        let id = self.pinned_buffer(block)?;
        self.buffer_manager
            .with_buffer(id, |buf| buf.contents().get_string(offset))
    }

    pub fn get_bool(&mut self, block: &BlockId, offset: usize) -> Result<bool> {
        self.concurrency.s_lock(block)?;
        let id = self.pinned_buffer(block)?;
        self.buffer_manager
            .with_buffer(id, |buf| buf.contents().get_bool(offset))
    }

    pub fn get_date(&mut self, block: &BlockId, offset: usize) -> Result<DateTime<Utc>> {
        self.concurrency.s_lock(block)?;
        let id = self.pinned_buffer(block)?;
        self.buffer_manager
            .with_buffer(id, |buf| buf.contents().get_date(offset))
    }

    /// Stores `val` at `offset` of `block` under an exclusive lock. With
    /// `log_it`, the displaced value is first captured in an update record
    /// so the change can be undone.
    pub fn set_int(
        &mut self,
        block: &BlockId,
        offset: usize,
        val: i32,
        log_it: bool,
    ) -> Result<()> {
        self.concurrency.x_lock(block)?;
        let id = self.pinned_buffer(block)?;
        let (txnum, recovery) = (self.txnum, &self.recovery);
        self.buffer_manager.with_buffer(id, |buf| {
            let lsn = if log_it {
                recovery.set_int(buf, offset)?
            } else {
                NO_LSN
            };
            buf.contents_mut().set_int(offset, val)?;
            buf.set_modified(txnum, lsn);
            Ok(())
        })
    }

    pub fn set_long(
        &mut self,
        block: &BlockId,
        offset: usize,
        val: i64,
        log_it: bool,
    ) -> Result<()> {
        self.concurrency.x_lock(block)?;
        let id = self.pinned_buffer(block)?;
        let (txnum, recovery) = (self.txnum, &self.recovery);
        self.buffer_manager.with_buffer(id, |buf| {
            let lsn = if log_it {
                recovery.set_long(buf, offset)?
            } else {
                NO_LSN
            };
            buf.contents_mut().set_long(offset, val)?;
            buf.set_modified(txnum, lsn);
            Ok(())
        })
    }

    pub fn set_short(
        &mut self,
        block: &BlockId,
        offset: usize,
        val: i16,
        log_it: bool,
    ) -> Result<()> {
        self.concurrency.x_lock(block)?;
        let id = self.pinned_buffer(block)?;
        let (txnum, recovery) = (self.txnum, &self.recovery);
        self.buffer_manager.with_buffer(id, |buf| {
            let lsn = if log_it {
                recovery.set_short(buf, offset)?
            } else {
                NO_LSN
            };
            buf.contents_mut().set_short(offset, val)?;
            buf.set_modified(txnum, lsn);
            Ok(())
        })
    }

    pub fn set_string(
        &mut self,
        block: &BlockId,
        offset: usize,
        val: &str,
        log_it: bool,
    ) -> Result<()> {
        self.concurrency.x_lock(block)?;
        let id = self.pinned_buffer(block)?;
        let (txnum, recovery) = (self.txnum, &self.recovery);
        self.buffer_manager.with_buffer(id, |buf| {
            let lsn = if log_it {
                recovery.set_string(buf, offset)?
            } else {
                NO_LSN
            };
            buf.contents_mut().set_string(offset, val)?;
            buf.set_modified(txnum, lsn);
            Ok(())
        })
    }

    pub fn set_bool(
        &mut self,
        block: &BlockId,
        offset: usize,
        val: bool,
        log_it: bool,
    ) -> Result<()> {
        self.concurrency.x_lock(block)?;
        let id = self.pinned_buffer(block)?;
        let (txnum, recovery) = (self.txnum, &self.recovery);
        self.buffer_manager.with_buffer(id, |buf| {
            let lsn = if log_it {
                recovery.set_bool(buf, offset)?
            } else {
                NO_LSN
            };
            buf.contents_mut().set_bool(offset, val)?;
            buf.set_modified(txnum, lsn);
            Ok(())
        })
    }

    pub fn set_date(
        &mut self,
        block: &BlockId,
        offset: usize,
        val: &DateTime<Utc>,
        log_it: bool,
    ) -> Result<()> {
        self.concurrency.x_lock(block)?;
        let id = self.pinned_buffer(block)?;
        let (txnum, recovery) = (self.txnum, &self.recovery);
        self.buffer_manager.with_buffer(id, |buf| {
            let lsn = if log_it {
                recovery.set_date(buf, offset)?
            } else {
                NO_LSN
            };
            buf.contents_mut().set_date(offset, val)?;
            buf.set_modified(txnum, lsn);
            Ok(())
        })
    }

    /// Number of blocks in `file_name`, counted under a shared lock on the
    /// file's end-of-file sentinel so no append can slip in.
    pub fn size(&mut self, file_name: &str) -> Result<i64> {
        let sentinel = BlockId::end_of_file(file_name);
        self.concurrency.s_lock(&sentinel)?;
        self.file_manager.length(file_name)
    }

    /// Appends a block to `file_name` under an exclusive lock on the
    /// file's end-of-file sentinel.
    pub fn append(&mut self, file_name: &str) -> Result<BlockId> {
        let sentinel = BlockId::end_of_file(file_name);
        self.concurrency.x_lock(&sentinel)?;
        self.file_manager.append(file_name)
    }

    fn pinned_buffer(&self, block: &BlockId) -> Result<crate::buffer::BufferId> {
        self.buffers
            .buffer_id(block)
            .ok_or_else(|| DbError::BlockNotPinned(block.clone()))
    }
}
