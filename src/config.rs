// Database configuration.
//
// One `DbConfig` is fixed at database creation and shared by every
// subsystem. Block size and buffer count cannot change for the life of the
// database directory.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::buffer::{ClockPolicy, LruPolicy, NaivePolicy, ReplacementPolicy};

/// Which buffer replacement policy the pool runs with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvictionPolicyKind {
    /// First unpinned buffer wins.
    Naive,
    /// Least-recently-unpinned buffer wins.
    Lru,
    /// Second-chance clock sweep.
    Clock,
}

impl EvictionPolicyKind {
    pub(crate) fn build(self) -> Box<dyn ReplacementPolicy + Send> {
        match self {
            EvictionPolicyKind::Naive => Box::new(NaivePolicy::new()),
            EvictionPolicyKind::Lru => Box::new(LruPolicy::new()),
            EvictionPolicyKind::Clock => Box::new(ClockPolicy::new()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbConfig {
    /// Size of every disk block and in-memory page, in bytes.
    pub block_size: usize,
    /// Number of slots in the buffer pool.
    pub buffer_count: usize,
    /// Name of the write-ahead log file inside the database directory.
    pub log_file: String,
    pub eviction: EvictionPolicyKind,
    /// Cumulative wait budget for a single lock request.
    pub lock_wait_timeout: Duration,
    /// How long a pin request waits for a buffer before aborting.
    pub pin_wait_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            block_size: 400,
            buffer_count: 8,
            log_file: "quarrydb.log".to_string(),
            eviction: EvictionPolicyKind::Naive,
            lock_wait_timeout: Duration::from_secs(10),
            pin_wait_timeout: Duration::from_secs(10),
        }
    }
}

impl DbConfig {
    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_buffer_count(mut self, buffer_count: usize) -> Self {
        self.buffer_count = buffer_count;
        self
    }

    pub fn with_log_file(mut self, log_file: impl Into<String>) -> Self {
        self.log_file = log_file.into();
        self
    }

    pub fn with_eviction(mut self, eviction: EvictionPolicyKind) -> Self {
        self.eviction = eviction;
        self
    }

    pub fn with_lock_wait_timeout(mut self, timeout: Duration) -> Self {
        self.lock_wait_timeout = timeout;
        self
    }

    pub fn with_pin_wait_timeout(mut self, timeout: Duration) -> Self {
        self.pin_wait_timeout = timeout;
        self
    }
}
