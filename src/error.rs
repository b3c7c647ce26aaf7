use thiserror::Error;

use crate::storage::BlockId;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("lock abort: wait budget exhausted for {0}")]
    LockAbort(BlockId),

    #[error("buffer abort: no buffer became available for {0}")]
    BufferAbort(BlockId),

    #[error("block {0} is not pinned by this transaction")]
    BlockNotPinned(BlockId),

    #[error("page access out of bounds: {len} bytes at offset {offset} in a {size}-byte page")]
    PageOverflow {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("invalid UTF-8 in stored string: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("invalid date value: {0} is out of range")]
    InvalidDate(i64),

    #[error("unknown log record tag {0}")]
    UnknownLogRecord(i32),

    #[error("log corruption: {0}")]
    CorruptLog(String),

    #[error("log record of {len} bytes cannot fit in a {block_size}-byte log block")]
    LogRecordTooLarge { len: usize, block_size: usize },
}

pub type Result<T> = std::result::Result<T, DbError>;
