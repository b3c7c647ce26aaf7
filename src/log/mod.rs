pub mod iterator;
pub mod manager;

pub use iterator::LogIterator;
pub use manager::LogManager;

/// Log sequence number: a monotonic per-append identifier, starting at 1.
pub type Lsn = i64;

/// Marks "no log record" for unlogged page changes.
pub const NO_LSN: Lsn = -1;
