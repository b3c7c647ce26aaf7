// Buffer replacement policies.
//
// The pool asks its policy for an unpinned victim whenever a pin misses.
// Policies only see pin events and the pool slice; they never touch pages.

use std::collections::VecDeque;

use crate::buffer::frame::Buffer;
use crate::buffer::BufferId;

pub trait ReplacementPolicy: Send {
    /// Called once with the pool size before any other method.
    fn initialize(&mut self, pool_size: usize);

    /// An unpinned buffer to evict, or `None` when every buffer is pinned.
    fn choose_unpinned(&mut self, buffers: &[Buffer]) -> Option<BufferId>;

    /// `id` was pinned (possibly again).
    fn pin_buffer(&mut self, id: BufferId);

    /// `id`'s pin count reached zero.
    fn unpin_buffer(&mut self, id: BufferId);
}

/// First unpinned buffer in pool order wins.
pub struct NaivePolicy;

impl NaivePolicy {
    pub fn new() -> Self {
        Self
    }
}

impl Default for NaivePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplacementPolicy for NaivePolicy {
    fn initialize(&mut self, _pool_size: usize) {}

    fn choose_unpinned(&mut self, buffers: &[Buffer]) -> Option<BufferId> {
        buffers.iter().position(|b| !b.is_pinned())
    }

    fn pin_buffer(&mut self, _id: BufferId) {}

    fn unpin_buffer(&mut self, _id: BufferId) {}
}

/// Least-recently-unpinned buffer wins.
pub struct LruPolicy {
    // Front = least recently unpinned.
    order: VecDeque<BufferId>,
}

impl LruPolicy {
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    fn remove(&mut self, id: BufferId) {
        if let Some(pos) = self.order.iter().position(|&b| b == id) {
            self.order.remove(pos);
        }
    }
}

impl Default for LruPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplacementPolicy for LruPolicy {
    fn initialize(&mut self, pool_size: usize) {
        self.order = (0..pool_size).collect();
    }

    fn choose_unpinned(&mut self, buffers: &[Buffer]) -> Option<BufferId> {
        let pos = self
            .order
            .iter()
            .position(|&id| !buffers[id].is_pinned())?;
        self.order.remove(pos)
    }

    fn pin_buffer(&mut self, id: BufferId) {
        self.remove(id);
    }

    fn unpin_buffer(&mut self, id: BufferId) {
        self.remove(id);
        self.order.push_back(id);
    }
}

/// Second-chance clock sweep: a reference bit set on unpin buys one
/// extra revolution before eviction.
pub struct ClockPolicy {
    hand: usize,
    reference_bits: Vec<bool>,
}

impl ClockPolicy {
    pub fn new() -> Self {
        Self {
            hand: 0,
            reference_bits: Vec::new(),
        }
    }
}

impl Default for ClockPolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplacementPolicy for ClockPolicy {
    fn initialize(&mut self, pool_size: usize) {
        self.hand = 0;
        self.reference_bits = vec![false; pool_size];
    }

    fn choose_unpinned(&mut self, buffers: &[Buffer]) -> Option<BufferId> {
        let size = buffers.len();
        // Two revolutions: the first may only clear reference bits.
        for _ in 0..2 * size {
            let id = self.hand;
            self.hand = (self.hand + 1) % size;

            if buffers[id].is_pinned() {
                continue;
            }
            if self.reference_bits[id] {
                self.reference_bits[id] = false;
            } else {
                return Some(id);
            }
        }
        None
    }

    fn pin_buffer(&mut self, _id: BufferId) {}

    fn unpin_buffer(&mut self, id: BufferId) {
        self.reference_bits[id] = true;
    }
}
