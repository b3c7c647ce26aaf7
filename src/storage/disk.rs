// Block-level file I/O for the database directory.
//
// Every data and log file is a sequence of `block_size`-byte blocks written
// in place. One mutex serializes all block operations; open files are
// cached. Writes and appends are followed by fsync so a returned operation
// is durable.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::Result;
use crate::storage::{BlockId, Page};

/// Snapshot of the manager's I/O counters.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FileStats {
    pub blocks_read: u64,
    pub blocks_written: u64,
}

pub struct FileManager {
    db_dir: PathBuf,
    block_size: usize,
    is_new: bool,
    open_files: Mutex<HashMap<String, File>>,
    blocks_read: AtomicU64,
    blocks_written: AtomicU64,
}

impl FileManager {
    /// Opens (or creates) the database directory and sweeps leftover
    /// temporary files.
    pub fn new(db_dir: impl AsRef<Path>, block_size: usize) -> Result<Self> {
        let db_dir = db_dir.as_ref().to_path_buf();
        let is_new = !db_dir.is_dir();
        if is_new {
            fs::create_dir_all(&db_dir)?;
            info!(dir = %db_dir.display(), "created database directory");
        }

        for entry in fs::read_dir(&db_dir)? {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with("temp") {
                fs::remove_file(entry.path())?;
                debug!(file = %entry.path().display(), "removed temporary file");
            }
        }

        Ok(Self {
            db_dir,
            block_size,
            is_new,
            open_files: Mutex::new(HashMap::new()),
            blocks_read: AtomicU64::new(0),
            blocks_written: AtomicU64::new(0),
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// True iff this process created the database directory.
    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn stats(&self) -> FileStats {
        FileStats {
            blocks_read: self.blocks_read.load(Ordering::Relaxed),
            blocks_written: self.blocks_written.load(Ordering::Relaxed),
        }
    }

    /// Fills `page` with the contents of `block`.
    ///
    /// A block wholly past the end of the file reads as zeroes; a short read
    /// inside the file is an error.
    pub fn read(&self, block: &BlockId, page: &mut Page) -> Result<()> {
        let mut files = self.open_files.lock();
        let file = Self::open_file(&self.db_dir, &mut files, block.file_name())?;
        file.seek(SeekFrom::Start(
            block.number() as u64 * self.block_size as u64,
        ))?;

        let buf = page.contents_mut();
        let mut filled = 0;
        while filled < buf.len() {
            let n = file.read(&mut buf[filled..])?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            buf.fill(0);
        } else if filled < buf.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("short read of block {block}: {filled} bytes"),
            )
            .into());
        }

        self.blocks_read.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Writes `page` to `block` and syncs it to disk.
    pub fn write(&self, block: &BlockId, page: &Page) -> Result<()> {
        let mut files = self.open_files.lock();
        let file = Self::open_file(&self.db_dir, &mut files, block.file_name())?;
        file.seek(SeekFrom::Start(
            block.number() as u64 * self.block_size as u64,
        ))?;
        file.write_all(page.contents())?;
        file.sync_all()?;

        self.blocks_written.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Extends `file_name` by one zeroed block and returns its id.
    pub fn append(&self, file_name: &str) -> Result<BlockId> {
        let mut files = self.open_files.lock();
        let file = Self::open_file(&self.db_dir, &mut files, file_name)?;
        let new_block_num = (file.metadata()?.len() / self.block_size as u64) as i64;

        file.seek(SeekFrom::Start(
            new_block_num as u64 * self.block_size as u64,
        ))?;
        file.write_all(&vec![0u8; self.block_size])?;
        file.sync_all()?;

        self.blocks_written.fetch_add(1, Ordering::Relaxed);
        Ok(BlockId::new(file_name, new_block_num))
    }

    /// Number of blocks currently in `file_name`.
    pub fn length(&self, file_name: &str) -> Result<i64> {
        let mut files = self.open_files.lock();
        let file = Self::open_file(&self.db_dir, &mut files, file_name)?;
        Ok((file.metadata()?.len() / self.block_size as u64) as i64)
    }

    fn open_file<'a>(
        db_dir: &Path,
        files: &'a mut HashMap<String, File>,
        file_name: &str,
    ) -> Result<&'a mut File> {
        match files.entry(file_name.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .create(true)
                    .open(db_dir.join(file_name))?;
                Ok(entry.insert(file))
            }
        }
    }
}
