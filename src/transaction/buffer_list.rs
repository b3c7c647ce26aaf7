// Pins held by one transaction.
//
// The ordered pin list keeps duplicate pins honest: each recorded pin is
// undone exactly once at transaction end, so the pool's pin counts balance
// however many times a block was pinned.

use std::collections::HashMap;
use std::sync::Arc;

use crate::buffer::{BufferId, BufferManager};
use crate::error::Result;
use crate::storage::BlockId;

pub(crate) struct BufferList {
    buffer_manager: Arc<BufferManager>,
    buffers: HashMap<BlockId, BufferId>,
    pins: Vec<BlockId>,
}

impl BufferList {
    pub(crate) fn new(buffer_manager: Arc<BufferManager>) -> Self {
        Self {
            buffer_manager,
            buffers: HashMap::new(),
            pins: Vec::new(),
        }
    }

    /// The pool slot holding `block`, if this transaction pinned it.
    pub(crate) fn buffer_id(&self, block: &BlockId) -> Option<BufferId> {
        self.buffers.get(block).copied()
    }

    pub(crate) fn pin(&mut self, block: &BlockId) -> Result<()> {
        let id = self.buffer_manager.pin(block)?;
        self.buffers.insert(block.clone(), id);
        self.pins.push(block.clone());
        Ok(())
    }

    /// Releases one pin on `block`; unknown blocks are ignored.
    pub(crate) fn unpin(&mut self, block: &BlockId) {
        if let Some(id) = self.buffer_id(block) {
            self.buffer_manager.unpin(id);
            if let Some(pos) = self.pins.iter().position(|b| b == block) {
                self.pins.remove(pos);
            }
            if !self.pins.contains(block) {
                self.buffers.remove(block);
            }
        }
    }

    /// Releases every recorded pin exactly once.
    pub(crate) fn unpin_all(&mut self) {
        for block in &self.pins {
            if let Some(&id) = self.buffers.get(block) {
                self.buffer_manager.unpin(id);
            }
        }
        self.pins.clear();
        self.buffers.clear();
    }
}
