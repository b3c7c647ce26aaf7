// QuarryDB - storage and transaction core for a small disk-based
// relational engine.
//
// Four subsystems cooperate to give ACID transactions over paged files:
// block-level file I/O, an undo-only write-ahead log, a fixed-size buffer
// pool obeying the WAL rule, and strict two-phase locking with
// timeout-based deadlock resolution. `Database` ties them together;
// `Transaction` is the interface everything above the core uses.

pub mod buffer;
pub mod config;
pub mod db;
pub mod error;
pub mod log;
pub mod storage;
pub mod transaction;
pub mod types;

pub use config::{DbConfig, EvictionPolicyKind};
pub use db::Database;
pub use error::{DbError, Result};
pub use storage::{BlockId, Page, END_OF_FILE};
pub use transaction::Transaction;
pub use types::{SqlType, Value};
