// Per-transaction recovery manager.
//
// Emits the transaction's WAL records and drives undo. The log is
// undo-only: committed work is durable because every dirty buffer is
// flushed before the commit record, and losers are rolled back by
// rewriting the old values captured in their update records.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::buffer::{Buffer, BufferManager};
use crate::error::{DbError, Result};
use crate::log::{LogManager, Lsn};
use crate::transaction::record::LogRecord;
use crate::transaction::{Transaction, TxNum};

#[derive(Clone)]
pub struct RecoveryManager {
    log_manager: Arc<LogManager>,
    buffer_manager: Arc<BufferManager>,
    txnum: TxNum,
}

impl RecoveryManager {
    /// Creates the manager for a freshly numbered transaction and writes
    /// its START record.
    pub(crate) fn new(
        log_manager: Arc<LogManager>,
        buffer_manager: Arc<BufferManager>,
        txnum: TxNum,
    ) -> Result<Self> {
        let manager = Self {
            log_manager,
            buffer_manager,
            txnum,
        };
        manager.append(&LogRecord::Start { txnum })?;
        Ok(manager)
    }

    /// Flushes this transaction's buffers, then force-writes the COMMIT
    /// record. Once this returns, the transaction survives any crash.
    pub fn commit(&self) -> Result<()> {
        self.buffer_manager.flush_all(self.txnum)?;
        let lsn = self.append(&LogRecord::Commit { txnum: self.txnum })?;
        self.log_manager.flush(lsn)?;
        debug!(txnum = self.txnum, "transaction committed");
        Ok(())
    }

    /// Undoes every change this transaction logged, newest first, then
    /// writes and flushes a ROLLBACK record.
    pub fn rollback(&self, tx: &mut Transaction) -> Result<()> {
        self.undo_own_records(tx)?;
        self.buffer_manager.flush_all(self.txnum)?;
        let lsn = self.append(&LogRecord::Rollback { txnum: self.txnum })?;
        self.log_manager.flush(lsn)?;
        debug!(txnum = self.txnum, "transaction rolled back");
        Ok(())
    }

    /// Rolls back every unfinished transaction found in the log, stopping
    /// at the last quiescent checkpoint, then writes a new one.
    pub fn recover(&self, tx: &mut Transaction) -> Result<()> {
        self.undo_losers(tx)?;
        self.buffer_manager.flush_all(self.txnum)?;
        let lsn = self.append(&LogRecord::Checkpoint)?;
        self.log_manager.flush(lsn)?;
        Ok(())
    }

    /// Logs an update to `offset` of the buffer's block, capturing the
    /// integer currently stored there as the old value.
    pub fn set_int(&self, buffer: &Buffer, offset: usize) -> Result<Lsn> {
        let block = self.modified_block(buffer)?;
        let old = buffer.contents().get_int(offset)?;
        self.append(&LogRecord::SetInt {
            txnum: self.txnum,
            block,
            offset,
            old,
        })
    }

    pub fn set_string(&self, buffer: &Buffer, offset: usize) -> Result<Lsn> {
        let block = self.modified_block(buffer)?;
        let old = buffer.contents().get_string(offset)?;
        self.append(&LogRecord::SetString {
            txnum: self.txnum,
            block,
            offset,
            old,
        })
    }

    pub fn set_long(&self, buffer: &Buffer, offset: usize) -> Result<Lsn> {
        let block = self.modified_block(buffer)?;
        let old = buffer.contents().get_long(offset)?;
        self.append(&LogRecord::SetLong {
            txnum: self.txnum,
            block,
            offset,
            old,
        })
    }

    pub fn set_short(&self, buffer: &Buffer, offset: usize) -> Result<Lsn> {
        let block = self.modified_block(buffer)?;
        let old = buffer.contents().get_short(offset)?;
        self.append(&LogRecord::SetShort {
            txnum: self.txnum,
            block,
            offset,
            old,
        })
    }

    pub fn set_bool(&self, buffer: &Buffer, offset: usize) -> Result<Lsn> {
        let block = self.modified_block(buffer)?;
        let old = buffer.contents().get_bool(offset)?;
        self.append(&LogRecord::SetBool {
            txnum: self.txnum,
            block,
            offset,
            old,
        })
    }

    pub fn set_date(&self, buffer: &Buffer, offset: usize) -> Result<Lsn> {
        let block = self.modified_block(buffer)?;
        let old: DateTime<Utc> = buffer.contents().get_date(offset)?;
        self.append(&LogRecord::SetDate {
            txnum: self.txnum,
            block,
            offset,
            old,
        })
    }

    fn undo_own_records(&self, tx: &mut Transaction) -> Result<()> {
        let mut iter = self.log_manager.iterator()?;
        while iter.has_next() {
            let record = LogRecord::from_bytes(&iter.next()?)?;
            if record.tx_number() == self.txnum {
                if matches!(record, LogRecord::Start { .. }) {
                    return Ok(());
                }
                record.undo(tx)?;
            }
        }
        Err(DbError::CorruptLog(format!(
            "rollback of transaction {} found no start record",
            self.txnum
        )))
    }

    fn undo_losers(&self, tx: &mut Transaction) -> Result<()> {
        let mut finished: HashSet<TxNum> = HashSet::new();
        let mut undone = 0usize;
        let mut iter = self.log_manager.iterator()?;
        while iter.has_next() {
            let record = LogRecord::from_bytes(&iter.next()?)?;
            match &record {
                LogRecord::Checkpoint => break,
                LogRecord::Commit { txnum } | LogRecord::Rollback { txnum } => {
                    finished.insert(*txnum);
                }
                LogRecord::Start { .. } => {}
                _ => {
                    if !finished.contains(&record.tx_number()) {
                        record.undo(tx)?;
                        undone += 1;
                    }
                }
            }
        }
        info!(undone, "recovery pass complete");
        Ok(())
    }

    fn modified_block(&self, buffer: &Buffer) -> Result<crate::storage::BlockId> {
        buffer
            .block()
            .cloned()
            .ok_or_else(|| DbError::CorruptLog("update logged against an unbound buffer".into()))
    }

    fn append(&self, record: &LogRecord) -> Result<Lsn> {
        self.log_manager.append(&record.to_bytes()?)
    }
}
