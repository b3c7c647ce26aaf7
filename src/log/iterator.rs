// Backward iteration over the log, newest record first.
//
// Within a block, records sit right of the boundary in reverse write
// order, so a forward walk from the boundary yields newest-first; blocks
// themselves are visited from the tail down to block 0.

use std::sync::Arc;

use crate::error::{DbError, Result};
use crate::storage::page::I32_SIZE;
use crate::storage::{BlockId, FileManager, Page};

pub struct LogIterator {
    file_manager: Arc<FileManager>,
    block: BlockId,
    page: Page,
    current_pos: usize,
    block_size: usize,
}

impl LogIterator {
    pub(crate) fn new(file_manager: Arc<FileManager>, tail_block: BlockId) -> Result<Self> {
        let block_size = file_manager.block_size();
        let mut iter = Self {
            file_manager,
            block: tail_block.clone(),
            page: Page::new(block_size),
            current_pos: 0,
            block_size,
        };
        iter.move_to_block(tail_block)?;
        Ok(iter)
    }

    /// True while records remain in this block or any earlier one.
    pub fn has_next(&self) -> bool {
        self.current_pos < self.block_size || self.block.number() > 0
    }

    /// The next record, moving backward through the log.
    pub fn next(&mut self) -> Result<Vec<u8>> {
        if self.current_pos == self.block_size {
            if self.block.number() == 0 {
                return Err(DbError::CorruptLog(
                    "log iterator advanced past the first block".to_string(),
                ));
            }
            let previous = BlockId::new(self.block.file_name(), self.block.number() - 1);
            self.move_to_block(previous)?;
        }

        let record = self.page.get_bytes(self.current_pos)?.to_vec();
        self.current_pos += I32_SIZE + record.len();
        Ok(record)
    }

    fn move_to_block(&mut self, block: BlockId) -> Result<()> {
        self.file_manager.read(&block, &mut self.page)?;
        let boundary = self.page.get_int(0)?;
        if boundary < I32_SIZE as i32 || boundary as usize > self.block_size {
            return Err(DbError::CorruptLog(format!(
                "block {block} has boundary {boundary} outside [{I32_SIZE}, {}]",
                self.block_size
            )));
        }
        self.current_pos = boundary as usize;
        self.block = block;
        Ok(())
    }
}
