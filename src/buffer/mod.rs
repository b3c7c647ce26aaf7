pub mod eviction;
pub mod frame;
pub mod manager;

pub use eviction::{ClockPolicy, LruPolicy, NaivePolicy, ReplacementPolicy};
pub use frame::Buffer;
pub use manager::BufferManager;

/// Index of a buffer slot inside the pool.
pub type BufferId = usize;
