use std::sync::Arc;

use crate::frame::FrameId;
use crate::links::LinkTable;

/// Wake-up handle the background writer registers via `NotifyBgWriter`.
/// `SetLatch` is the one primitive this crate needs from it.
pub trait Latch: Send + Sync {
    fn set(&self);
}

/// The process-wide, single-instance control block: the freelist, the
/// victim queues, the CLOCK hand, and the allocation counters. In a
/// real deployment this lives in shared memory behind one exclusive
/// lock; here it is the value wrapped by `BufferStrategy`'s
/// `parking_lot::FairMutex`, which plays the role of the freelist lock.
pub struct StrategyControl {
    /// CLOCK hand.
    pub next_victim_buffer: FrameId,
    /// Complete CLOCK cycles, a statistic only.
    pub complete_passes: u32,
    /// Allocations since the last `SyncStart` reset.
    pub num_buffer_allocs: u32,

    /// Freelist head/tail; `None` means empty.
    pub first_free_buffer: Option<FrameId>,
    pub last_free_buffer: Option<FrameId>,

    /// Pending bgwriter wakeup, if any.
    pub bgwriter_latch: Option<Arc<dyn Latch>>,

    /// Main victim queue (LRU/MRU/CLOCK feed, 2Q's hot queue) head/tail.
    pub first_unpinned: Option<FrameId>,
    pub last_unpinned: Option<FrameId>,

    /// 2Q probation (A1) queue head/tail.
    pub a1_head: Option<FrameId>,
    pub a1_tail: Option<FrameId>,

    /// freeNext/prev/next for every frame, freelist-lock protected.
    pub links: LinkTable,
}

impl StrategyControl {
    /// All-zero/empty control block for `n` frames, matching
    /// `StrategyInitialize`'s primary-attacher branch before the
    /// freelist is threaded through.
    pub fn new(n: usize) -> Self {
        Self {
            next_victim_buffer: 0,
            complete_passes: 0,
            num_buffer_allocs: 0,
            first_free_buffer: None,
            last_free_buffer: None,
            bgwriter_latch: None,
            first_unpinned: None,
            last_unpinned: None,
            a1_head: None,
            a1_tail: None,
            links: LinkTable::new(n),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.links.len()
    }
}
