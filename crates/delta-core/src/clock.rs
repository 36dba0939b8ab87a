//! Execution clock
//!
//! Calls execute at a (timestamp, block) point. Nothing advances on its own:
//! the host moves the clock between calls, which keeps reward accrual fully
//! deterministic.

use serde::{Deserialize, Serialize};

/// Current execution point
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clock {
    /// Seconds since an arbitrary epoch
    timestamp: u64,

    /// Block height
    block: u64,
}

impl Clock {
    pub fn new(timestamp: u64, block: u64) -> Self {
        Self { timestamp, block }
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn block(&self) -> u64 {
        self.block
    }

    /// Advance wall time without producing blocks
    pub fn advance_time(&mut self, seconds: u64) {
        self.timestamp = self.timestamp.saturating_add(seconds);
    }

    /// Produce `blocks` blocks, `seconds_per_block` apart
    pub fn mine(&mut self, blocks: u64, seconds_per_block: u64) {
        self.block = self.block.saturating_add(blocks);
        self.timestamp = self
            .timestamp
            .saturating_add(blocks.saturating_mul(seconds_per_block));
    }
}
