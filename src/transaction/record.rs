// The write-ahead log record family.
//
// Every record starts with a 32-bit type tag. Update records carry the
// block, offset, and the value that was there before the change; undo
// rewrites that old value with logging disabled. The log is undo-only, so
// new values are never recorded.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::error::{DbError, Result};
use crate::storage::page::I32_SIZE;
use crate::storage::{BlockId, Page};
use crate::transaction::{Transaction, TxNum};

pub const CHECKPOINT: i32 = 0;
pub const START: i32 = 1;
pub const COMMIT: i32 = 2;
pub const ROLLBACK: i32 = 3;
pub const SET_INT: i32 = 4;
pub const SET_STRING: i32 = 5;
pub const SET_LONG: i32 = 6;
pub const SET_SHORT: i32 = 7;
pub const SET_BOOL: i32 = 8;
pub const SET_DATE: i32 = 9;

#[derive(Debug, Clone, PartialEq)]
pub enum LogRecord {
    Checkpoint,
    Start {
        txnum: TxNum,
    },
    Commit {
        txnum: TxNum,
    },
    Rollback {
        txnum: TxNum,
    },
    SetInt {
        txnum: TxNum,
        block: BlockId,
        offset: usize,
        old: i32,
    },
    SetString {
        txnum: TxNum,
        block: BlockId,
        offset: usize,
        old: String,
    },
    SetLong {
        txnum: TxNum,
        block: BlockId,
        offset: usize,
        old: i64,
    },
    SetShort {
        txnum: TxNum,
        block: BlockId,
        offset: usize,
        old: i16,
    },
    SetBool {
        txnum: TxNum,
        block: BlockId,
        offset: usize,
        old: bool,
    },
    SetDate {
        txnum: TxNum,
        block: BlockId,
        offset: usize,
        old: DateTime<Utc>,
    },
}

// Field positions shared by every update record:
// [tag i32][txnum i32][file string][block i64][offset i32][old value].
const TX_POS: usize = I32_SIZE;
const FILE_POS: usize = TX_POS + I32_SIZE;

fn update_positions(file_name: &str) -> (usize, usize, usize) {
    let block_pos = FILE_POS + Page::max_length(file_name.chars().count());
    let offset_pos = block_pos + 8;
    let value_pos = offset_pos + I32_SIZE;
    (block_pos, offset_pos, value_pos)
}

impl LogRecord {
    /// Decodes a record from its log bytes; the leading tag picks the
    /// variant. Unknown tags fail, which aborts recovery.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let page = Page::from_bytes(bytes.to_vec());
        let tag = page.get_int(0)?;
        match tag {
            CHECKPOINT => Ok(LogRecord::Checkpoint),
            START => Ok(LogRecord::Start {
                txnum: page.get_int(TX_POS)?,
            }),
            COMMIT => Ok(LogRecord::Commit {
                txnum: page.get_int(TX_POS)?,
            }),
            ROLLBACK => Ok(LogRecord::Rollback {
                txnum: page.get_int(TX_POS)?,
            }),
            SET_INT | SET_STRING | SET_LONG | SET_SHORT | SET_BOOL | SET_DATE => {
                let txnum = page.get_int(TX_POS)?;
                let file_name = page.get_string(FILE_POS)?;
                let (block_pos, offset_pos, value_pos) = update_positions(&file_name);
                let block = BlockId::new(file_name, page.get_long(block_pos)?);
                let offset = page.get_int(offset_pos)? as usize;
                Ok(match tag {
                    SET_INT => LogRecord::SetInt {
                        txnum,
                        block,
                        offset,
                        old: page.get_int(value_pos)?,
                    },
                    SET_STRING => LogRecord::SetString {
                        txnum,
                        block,
                        offset,
                        old: page.get_string(value_pos)?,
                    },
                    SET_LONG => LogRecord::SetLong {
                        txnum,
                        block,
                        offset,
                        old: page.get_long(value_pos)?,
                    },
                    SET_SHORT => LogRecord::SetShort {
                        txnum,
                        block,
                        offset,
                        old: page.get_short(value_pos)?,
                    },
                    SET_BOOL => LogRecord::SetBool {
                        txnum,
                        block,
                        offset,
                        old: page.get_bool(value_pos)?,
                    },
                    _ => LogRecord::SetDate {
                        txnum,
                        block,
                        offset,
                        old: page.get_date(value_pos)?,
                    },
                })
            }
            other => Err(DbError::UnknownLogRecord(other)),
        }
    }

    /// Encodes this record for appending to the log.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            LogRecord::Checkpoint => {
                let mut page = Page::new(I32_SIZE);
                page.set_int(0, CHECKPOINT)?;
                Ok(page.contents().to_vec())
            }
            LogRecord::Start { txnum } => Self::lifecycle_bytes(START, *txnum),
            LogRecord::Commit { txnum } => Self::lifecycle_bytes(COMMIT, *txnum),
            LogRecord::Rollback { txnum } => Self::lifecycle_bytes(ROLLBACK, *txnum),
            LogRecord::SetInt {
                txnum,
                block,
                offset,
                old,
            } => Self::update_bytes(SET_INT, *txnum, block, *offset, I32_SIZE, |p, pos| {
                p.set_int(pos, *old)
            }),
            LogRecord::SetString {
                txnum,
                block,
                offset,
                old,
            } => Self::update_bytes(
                SET_STRING,
                *txnum,
                block,
                *offset,
                Page::max_length(old.chars().count()),
                |p, pos| p.set_string(pos, old),
            ),
            LogRecord::SetLong {
                txnum,
                block,
                offset,
                old,
            } => Self::update_bytes(SET_LONG, *txnum, block, *offset, 8, |p, pos| {
                p.set_long(pos, *old)
            }),
            LogRecord::SetShort {
                txnum,
                block,
                offset,
                old,
            } => Self::update_bytes(SET_SHORT, *txnum, block, *offset, 2, |p, pos| {
                p.set_short(pos, *old)
            }),
            LogRecord::SetBool {
                txnum,
                block,
                offset,
                old,
            } => Self::update_bytes(SET_BOOL, *txnum, block, *offset, 1, |p, pos| {
                p.set_bool(pos, *old)
            }),
            LogRecord::SetDate {
                txnum,
                block,
                offset,
                old,
            } => Self::update_bytes(SET_DATE, *txnum, block, *offset, 8, |p, pos| {
                p.set_date(pos, old)
            }),
        }
    }

    /// The record's type tag.
    pub fn op(&self) -> i32 {
        match self {
            LogRecord::Checkpoint => CHECKPOINT,
            LogRecord::Start { .. } => START,
            LogRecord::Commit { .. } => COMMIT,
            LogRecord::Rollback { .. } => ROLLBACK,
            LogRecord::SetInt { .. } => SET_INT,
            LogRecord::SetString { .. } => SET_STRING,
            LogRecord::SetLong { .. } => SET_LONG,
            LogRecord::SetShort { .. } => SET_SHORT,
            LogRecord::SetBool { .. } => SET_BOOL,
            LogRecord::SetDate { .. } => SET_DATE,
        }
    }

    /// The transaction this record belongs to; -1 for checkpoints.
    pub fn tx_number(&self) -> TxNum {
        match self {
            LogRecord::Checkpoint => -1,
            LogRecord::Start { txnum }
            | LogRecord::Commit { txnum }
            | LogRecord::Rollback { txnum } => *txnum,
            LogRecord::SetInt { txnum, .. }
            | LogRecord::SetString { txnum, .. }
            | LogRecord::SetLong { txnum, .. }
            | LogRecord::SetShort { txnum, .. }
            | LogRecord::SetBool { txnum, .. }
            | LogRecord::SetDate { txnum, .. } => *txnum,
        }
    }

    /// Restores the old value this record captured. Lifecycle records undo
    /// to nothing.
    pub fn undo(&self, tx: &mut Transaction) -> Result<()> {
        match self {
            LogRecord::SetInt { block, offset, old, .. } => {
                tx.pin(block)?;
                tx.set_int(block, *offset, *old, false)?;
                tx.unpin(block);
            }
            LogRecord::SetString { block, offset, old, .. } => {
                tx.pin(block)?;
                tx.set_string(block, *offset, old, false)?;
                tx.unpin(block);
            }
            LogRecord::SetLong { block, offset, old, .. } => {
                tx.pin(block)?;
                tx.set_long(block, *offset, *old, false)?;
                tx.unpin(block);
            }
            LogRecord::SetShort { block, offset, old, .. } => {
                tx.pin(block)?;
                tx.set_short(block, *offset, *old, false)?;
                tx.unpin(block);
            }
            LogRecord::SetBool { block, offset, old, .. } => {
                tx.pin(block)?;
                tx.set_bool(block, *offset, *old, false)?;
                tx.unpin(block);
            }
            LogRecord::SetDate { block, offset, old, .. } => {
                tx.pin(block)?;
                tx.set_date(block, *offset, old, false)?;
                tx.unpin(block);
            }
            LogRecord::Checkpoint
            | LogRecord::Start { .. }
            | LogRecord::Commit { .. }
            | LogRecord::Rollback { .. } => {}
        }
        Ok(())
    }

    fn lifecycle_bytes(tag: i32, txnum: TxNum) -> Result<Vec<u8>> {
        let mut page = Page::new(2 * I32_SIZE);
        page.set_int(0, tag)?;
        page.set_int(TX_POS, txnum)?;
        Ok(page.contents().to_vec())
    }

    fn update_bytes(
        tag: i32,
        txnum: TxNum,
        block: &BlockId,
        offset: usize,
        value_size: usize,
        write_value: impl FnOnce(&mut Page, usize) -> Result<()>,
    ) -> Result<Vec<u8>> {
        let (block_pos, offset_pos, value_pos) = update_positions(block.file_name());
        let mut page = Page::new(value_pos + value_size);
        page.set_int(0, tag)?;
        page.set_int(TX_POS, txnum)?;
        page.set_string(FILE_POS, block.file_name())?;
        page.set_long(block_pos, block.number())?;
        page.set_int(offset_pos, offset as i32)?;
        write_value(&mut page, value_pos)?;
        Ok(page.contents().to_vec())
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogRecord::Checkpoint => write!(f, "<CHECKPOINT>"),
            LogRecord::Start { txnum } => write!(f, "<START {txnum}>"),
            LogRecord::Commit { txnum } => write!(f, "<COMMIT {txnum}>"),
            LogRecord::Rollback { txnum } => write!(f, "<ROLLBACK {txnum}>"),
            LogRecord::SetInt { txnum, block, offset, old } => {
                write!(f, "<SETINT {txnum} {block} {offset} {old}>")
            }
            LogRecord::SetString { txnum, block, offset, old } => {
                write!(f, "<SETSTRING {txnum} {block} {offset} {old}>")
            }
            LogRecord::SetLong { txnum, block, offset, old } => {
                write!(f, "<SETLONG {txnum} {block} {offset} {old}>")
            }
            LogRecord::SetShort { txnum, block, offset, old } => {
                write!(f, "<SETSHORT {txnum} {block} {offset} {old}>")
            }
            LogRecord::SetBool { txnum, block, offset, old } => {
                write!(f, "<SETBOOL {txnum} {block} {offset} {old}>")
            }
            LogRecord::SetDate { txnum, block, offset, old } => {
                write!(f, "<SETDATE {txnum} {block} {offset} {old}>")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn round_trip(record: LogRecord) {
        let bytes = record.to_bytes().unwrap();
        assert_eq!(LogRecord::from_bytes(&bytes).unwrap(), record);
    }

    #[test]
    fn lifecycle_records_round_trip() {
        round_trip(LogRecord::Checkpoint);
        round_trip(LogRecord::Start { txnum: 1 });
        round_trip(LogRecord::Commit { txnum: 42 });
        round_trip(LogRecord::Rollback { txnum: 7 });
    }

    #[test]
    fn update_records_round_trip() {
        let block = BlockId::new("data.tbl", 3);
        round_trip(LogRecord::SetInt {
            txnum: 2,
            block: block.clone(),
            offset: 80,
            old: -17,
        });
        round_trip(LogRecord::SetString {
            txnum: 2,
            block: block.clone(),
            offset: 40,
            old: "héllo".to_string(),
        });
        round_trip(LogRecord::SetLong {
            txnum: 3,
            block: block.clone(),
            offset: 0,
            old: i64::MIN,
        });
        round_trip(LogRecord::SetShort {
            txnum: 3,
            block: block.clone(),
            offset: 8,
            old: -2,
        });
        round_trip(LogRecord::SetBool {
            txnum: 4,
            block: block.clone(),
            offset: 10,
            old: true,
        });
        round_trip(LogRecord::SetDate {
            txnum: 4,
            block,
            offset: 12,
            old: Utc.with_ymd_and_hms(1999, 12, 31, 23, 59, 59).unwrap(),
        });
    }

    #[test]
    fn unknown_tag_is_rejected() {
        let mut page = Page::new(I32_SIZE);
        page.set_int(0, 99).unwrap();
        assert!(matches!(
            LogRecord::from_bytes(page.contents()),
            Err(DbError::UnknownLogRecord(99))
        ));
    }

    #[test]
    fn truncated_record_is_rejected() {
        let full = LogRecord::SetInt {
            txnum: 1,
            block: BlockId::new("data.tbl", 0),
            offset: 0,
            old: 5,
        }
        .to_bytes()
        .unwrap();
        assert!(LogRecord::from_bytes(&full[..full.len() / 2]).is_err());
    }

    #[test]
    fn display_formats_for_log_dumps() {
        let record = LogRecord::SetInt {
            txnum: 2,
            block: BlockId::new("data.tbl", 1),
            offset: 80,
            old: 42,
        };
        assert_eq!(
            record.to_string(),
            "<SETINT 2 [file data.tbl, block 1] 80 42>"
        );
        assert_eq!(LogRecord::Start { txnum: 9 }.to_string(), "<START 9>");
    }
}
