// Top-level database handle.
//
// Wires the file, log, and buffer managers to one lock table and mints
// transactions. Every collaborator layer goes through `new_tx`; nothing
// else reaches the subsystems directly.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::buffer::BufferManager;
use crate::config::DbConfig;
use crate::error::Result;
use crate::log::LogManager;
use crate::storage::FileManager;
use crate::transaction::{LockTable, Transaction};

pub struct Database {
    config: DbConfig,
    file_manager: Arc<FileManager>,
    log_manager: Arc<LogManager>,
    buffer_manager: Arc<BufferManager>,
    lock_table: Arc<LockTable>,
}

impl Database {
    /// Opens (or creates) the database directory under `config`.
    pub fn new(dir: impl AsRef<Path>, config: DbConfig) -> Result<Self> {
        let file_manager = Arc::new(FileManager::new(dir.as_ref(), config.block_size)?);
        let log_manager = Arc::new(LogManager::new(
            Arc::clone(&file_manager),
            &config.log_file,
        )?);
        let buffer_manager = Arc::new(BufferManager::new(
            Arc::clone(&file_manager),
            Arc::clone(&log_manager),
            config.buffer_count,
            config.eviction.build(),
            config.pin_wait_timeout,
        ));
        let lock_table = Arc::new(LockTable::new(config.lock_wait_timeout));

        info!(
            dir = %dir.as_ref().display(),
            block_size = config.block_size,
            buffers = config.buffer_count,
            new = file_manager.is_new(),
            "database opened"
        );

        Ok(Self {
            config,
            file_manager,
            log_manager,
            buffer_manager,
            lock_table,
        })
    }

    /// Opens with the stock configuration (400-byte blocks, 8 buffers).
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new(dir, DbConfig::default())
    }

    /// Starts a new transaction.
    pub fn new_tx(&self) -> Result<Transaction> {
        Transaction::new(
            Arc::clone(&self.file_manager),
            Arc::clone(&self.log_manager),
            Arc::clone(&self.buffer_manager),
            Arc::clone(&self.lock_table),
        )
    }

    /// Rolls back whatever a previous process left unfinished. Run once at
    /// startup, before user transactions.
    pub fn recover(&self) -> Result<()> {
        self.new_tx()?.recover()
    }

    /// True iff this process created the database directory.
    pub fn is_new(&self) -> bool {
        self.file_manager.is_new()
    }

    pub fn config(&self) -> &DbConfig {
        &self.config
    }

    pub fn file_manager(&self) -> &Arc<FileManager> {
        &self.file_manager
    }

    pub fn log_manager(&self) -> &Arc<LogManager> {
        &self.log_manager
    }

    pub fn buffer_manager(&self) -> &Arc<BufferManager> {
        &self.buffer_manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_then_reopens() {
        let dir = tempdir().unwrap();
        {
            let db = Database::open(dir.path().join("db")).unwrap();
            assert!(db.is_new());
        }
        let db = Database::open(dir.path().join("db")).unwrap();
        assert!(!db.is_new());
    }

    #[test]
    fn transactions_get_distinct_numbers() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path()).unwrap();
        let t1 = db.new_tx().unwrap();
        let t2 = db.new_tx().unwrap();
        assert!(t2.tx_num() > t1.tx_num());
        t1.commit().unwrap();
        t2.commit().unwrap();
    }
}
