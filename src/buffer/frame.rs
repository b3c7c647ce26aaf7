// One slot of the buffer pool.
//
// A buffer is dirty exactly when it carries a modifying transaction
// number. Flushing honors the WAL rule: the log is forced up to the
// buffer's highest recorded LSN before the page bytes reach disk.

use std::sync::Arc;

use tracing::trace;

use crate::error::Result;
use crate::log::{LogManager, Lsn};
use crate::storage::{BlockId, FileManager, Page};
use crate::transaction::TxNum;

pub struct Buffer {
    file_manager: Arc<FileManager>,
    log_manager: Arc<LogManager>,
    page: Page,
    block: Option<BlockId>,
    pins: u32,
    modifying_tx: Option<TxNum>,
    lsn: Option<Lsn>,
}

impl Buffer {
    pub(crate) fn new(file_manager: Arc<FileManager>, log_manager: Arc<LogManager>) -> Self {
        let page = Page::new(file_manager.block_size());
        Self {
            file_manager,
            log_manager,
            page,
            block: None,
            pins: 0,
            modifying_tx: None,
            lsn: None,
        }
    }

    pub fn contents(&self) -> &Page {
        &self.page
    }

    pub fn contents_mut(&mut self) -> &mut Page {
        &mut self.page
    }

    /// The block this buffer currently holds, if any.
    pub fn block(&self) -> Option<&BlockId> {
        self.block.as_ref()
    }

    pub fn is_pinned(&self) -> bool {
        self.pins > 0
    }

    pub fn modifying_tx(&self) -> Option<TxNum> {
        self.modifying_tx
    }

    /// Records that `txnum` changed this page; a non-negative `lsn` becomes
    /// the buffer's highest associated log record.
    pub fn set_modified(&mut self, txnum: TxNum, lsn: Lsn) {
        self.modifying_tx = Some(txnum);
        if lsn >= 0 {
            self.lsn = Some(lsn);
        }
    }

    /// Rebinds this buffer to `block`, flushing any dirty content first.
    /// Pin count resets; the caller pins afterwards.
    pub(crate) fn assign_to_block(&mut self, block: BlockId) -> Result<()> {
        self.flush()?;
        trace!(%block, "assigning buffer");
        self.file_manager.read(&block, &mut self.page)?;
        self.block = Some(block);
        self.pins = 0;
        Ok(())
    }

    /// Writes the page to disk if dirty, forcing the log first (WAL rule).
    pub(crate) fn flush(&mut self) -> Result<()> {
        if self.modifying_tx.is_some() {
            if let Some(lsn) = self.lsn {
                self.log_manager.flush(lsn)?;
            }
            if let Some(block) = &self.block {
                self.file_manager.write(block, &self.page)?;
            }
            self.modifying_tx = None;
        }
        Ok(())
    }

    pub(crate) fn pin(&mut self) {
        self.pins += 1;
    }

    pub(crate) fn unpin(&mut self) {
        debug_assert!(self.pins > 0, "unpin of an unpinned buffer");
        self.pins = self.pins.saturating_sub(1);
    }
}
