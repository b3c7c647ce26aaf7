// Append-only write-ahead log over the paged file layer.
//
// One in-memory page holds the tail block. Records fill the block right to
// left; the first four bytes hold the boundary, the offset of the most
// recently written record. Appends move the boundary left and spill to a
// freshly appended block when the page is full, so iteration runs
// latest-first without any forward scan.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::error::{DbError, Result};
use crate::log::{LogIterator, Lsn};
use crate::storage::page::I32_SIZE;
use crate::storage::{BlockId, FileManager, Page};

struct LogState {
    page: Page,
    current_block: BlockId,
    latest_lsn: Lsn,
    last_saved_lsn: Lsn,
}

pub struct LogManager {
    file_manager: Arc<FileManager>,
    log_file: String,
    state: Mutex<LogState>,
}

impl LogManager {
    /// Opens the log file, positioning the in-memory page over its tail
    /// block (or a fresh first block for an empty log).
    pub fn new(file_manager: Arc<FileManager>, log_file: &str) -> Result<Self> {
        let mut page = Page::new(file_manager.block_size());
        let log_size = file_manager.length(log_file)?;

        let current_block = if log_size == 0 {
            Self::append_new_block(&file_manager, log_file, &mut page)?
        } else {
            let block = BlockId::new(log_file, log_size - 1);
            file_manager.read(&block, &mut page)?;
            block
        };

        Ok(Self {
            file_manager,
            log_file: log_file.to_string(),
            state: Mutex::new(LogState {
                page,
                current_block,
                latest_lsn: 0,
                last_saved_lsn: 0,
            }),
        })
    }

    /// Appends `record` and returns its LSN.
    ///
    /// The record is only guaranteed on disk once `flush` is called with
    /// this LSN or a later one.
    pub fn append(&self, record: &[u8]) -> Result<Lsn> {
        let mut state = self.state.lock();

        let bytes_needed = record.len() + I32_SIZE;
        let block_size = self.file_manager.block_size();
        if bytes_needed + I32_SIZE > block_size {
            return Err(DbError::LogRecordTooLarge {
                len: record.len(),
                block_size,
            });
        }

        let mut boundary = state.page.get_int(0)? as usize;
        if boundary.saturating_sub(bytes_needed) < I32_SIZE {
            // The tail block is full: persist it and start a new one.
            self.flush_locked(&mut state)?;
            let new_block =
                Self::append_new_block(&self.file_manager, &self.log_file, &mut state.page)?;
            state.current_block = new_block;
            boundary = state.page.get_int(0)? as usize;
        }

        let record_pos = boundary - bytes_needed;
        state.page.set_bytes(record_pos, record)?;
        state.page.set_int(0, record_pos as i32)?;
        state.latest_lsn += 1;
        trace!(lsn = state.latest_lsn, len = record.len(), "appended log record");
        Ok(state.latest_lsn)
    }

    /// Ensures every record with an LSN up to `lsn` is on disk.
    pub fn flush(&self, lsn: Lsn) -> Result<()> {
        let mut state = self.state.lock();
        if lsn >= state.last_saved_lsn {
            self.flush_locked(&mut state)?;
        }
        Ok(())
    }

    /// A backward iterator over the log, latest record first. The tail is
    /// flushed first so the iterator sees every appended record.
    pub fn iterator(&self) -> Result<LogIterator> {
        let mut state = self.state.lock();
        self.flush_locked(&mut state)?;
        LogIterator::new(Arc::clone(&self.file_manager), state.current_block.clone())
    }

    fn flush_locked(&self, state: &mut LogState) -> Result<()> {
        self.file_manager.write(&state.current_block, &state.page)?;
        state.last_saved_lsn = state.latest_lsn;
        Ok(())
    }

    fn append_new_block(
        file_manager: &FileManager,
        log_file: &str,
        page: &mut Page,
    ) -> Result<BlockId> {
        let block = file_manager.append(log_file)?;
        page.fill_zero();
        page.set_int(0, file_manager.block_size() as i32)?;
        file_manager.write(&block, page)?;
        Ok(block)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn log_manager(block_size: usize) -> (tempfile::TempDir, LogManager) {
        let dir = tempdir().unwrap();
        let fm = Arc::new(FileManager::new(dir.path(), block_size).unwrap());
        let lm = LogManager::new(fm, "test.log").unwrap();
        (dir, lm)
    }

    fn record(n: i32) -> Vec<u8> {
        let mut page = Page::new(Page::max_length(16) + I32_SIZE);
        page.set_string(0, &format!("record {n}")).unwrap();
        page.set_int(Page::max_length(16), n).unwrap();
        page.contents().to_vec()
    }

    #[test]
    fn lsns_are_strictly_increasing_from_one() {
        let (_dir, lm) = log_manager(400);
        for expected in 1..=20 {
            assert_eq!(lm.append(&record(expected as i32)).unwrap(), expected);
        }
    }

    #[test]
    fn iterator_returns_records_latest_first() {
        let (_dir, lm) = log_manager(400);
        for n in 1..=35 {
            lm.append(&record(n)).unwrap();
        }

        let mut iter = lm.iterator().unwrap();
        let mut expected = 35;
        while iter.has_next() {
            let bytes = iter.next().unwrap();
            let page = Page::from_bytes(bytes);
            assert_eq!(page.get_int(Page::max_length(16)).unwrap(), expected);
            expected -= 1;
        }
        assert_eq!(expected, 0);
    }

    #[test]
    fn records_survive_block_spill() {
        // Small blocks force several spills.
        let (_dir, lm) = log_manager(120);
        for n in 1..=25 {
            lm.append(&record(n)).unwrap();
        }
        let count = {
            let mut iter = lm.iterator().unwrap();
            let mut count = 0;
            while iter.has_next() {
                iter.next().unwrap();
                count += 1;
            }
            count
        };
        assert_eq!(count, 25);
    }

    #[test]
    fn oversized_record_is_rejected() {
        let (_dir, lm) = log_manager(100);
        let huge = vec![7u8; 200];
        assert!(matches!(
            lm.append(&huge),
            Err(DbError::LogRecordTooLarge { .. })
        ));
    }

    #[test]
    fn reopen_continues_after_existing_records() {
        let dir = tempdir().unwrap();
        let fm = Arc::new(FileManager::new(dir.path(), 400).unwrap());
        {
            let lm = LogManager::new(Arc::clone(&fm), "test.log").unwrap();
            for n in 1..=10 {
                lm.append(&record(n)).unwrap();
            }
            lm.flush(10).unwrap();
        }

        let lm = LogManager::new(fm, "test.log").unwrap();
        lm.append(&record(11)).unwrap();

        let mut iter = lm.iterator().unwrap();
        assert!(iter.has_next());
        let newest = Page::from_bytes(iter.next().unwrap());
        assert_eq!(newest.get_int(Page::max_length(16)).unwrap(), 11);
        let mut rest = 0;
        while iter.has_next() {
            iter.next().unwrap();
            rest += 1;
        }
        assert_eq!(rest, 10);
    }
}
