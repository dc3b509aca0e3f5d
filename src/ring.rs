//! Access-strategy rings: a small, caller-private bounded reuse set
//! that lets BULKREAD/BULKWRITE/VACUUM scans cycle a fixed working set
//! of frames instead of polluting the shared victim queues. Entirely
//! unsynchronized — each `AccessStrategy` is owned by one caller.

use crate::frame::{FrameHeaderGuard, FrameId, FrameTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessStrategyKind {
    BulkRead,
    BulkWrite,
    Vacuum,
}

impl AccessStrategyKind {
    fn base_ring_size(self, page_size: usize) -> usize {
        match self {
            AccessStrategyKind::BulkRead => 256 * 1024 / page_size,
            AccessStrategyKind::BulkWrite => 16 * 1024 * 1024 / page_size,
            AccessStrategyKind::Vacuum => 256 * 1024 / page_size,
        }
    }
}

/// Per-caller ring of reusable frame indices.
pub struct AccessStrategy {
    kind: AccessStrategyKind,
    ring_size: usize,
    current: usize,
    current_was_in_ring: bool,
    buffers: Vec<Option<FrameId>>,
}

impl AccessStrategy {
    /// `GetAccessStrategy`. `n` is the total frame count, used only to
    /// bound the ring to at most N/8 so a ring can never dominate the
    /// shared pool.
    pub fn new(kind: AccessStrategyKind, page_size: usize, n: usize) -> Self {
        let ring_size = kind.base_ring_size(page_size).min(n / 8).max(1);
        Self {
            kind,
            ring_size,
            // The first `GetFromRing` call advances before inspecting a
            // slot, so start one step behind slot 0.
            current: ring_size - 1,
            current_was_in_ring: false,
            buffers: vec![None; ring_size],
        }
    }

    pub fn kind(&self) -> AccessStrategyKind {
        self.kind
    }

    pub fn ring_size(&self) -> usize {
        self.ring_size
    }

    /// `GetBufferFromRing`: advance to the next ring slot and, if it
    /// already names a frame, accept it when `refcount == 0` and
    /// `usage_count <= 1` (our own prior touch leaves usage_count at 1;
    /// anything higher means someone else has used it since). Returns
    /// `None` when the slot is unpopulated or the frame fails the
    /// acceptance check — either way the caller falls through to
    /// global allocation and later calls `add_to_ring`.
    pub fn get_from_ring<'a>(
        &mut self,
        frames: &'a FrameTable,
    ) -> Option<(FrameId, FrameHeaderGuard<'a>)> {
        self.current = (self.current + 1) % self.ring_size;
        let id = self.buffers[self.current]?;

        let guard = frames.lock(id);
        if guard.refcount == 0 && guard.usage_count <= 1 {
            self.current_was_in_ring = true;
            Some((id, guard))
        } else {
            drop(guard);
            self.current_was_in_ring = false;
            None
        }
    }

    /// `AddBufferToRing`: caller holds `id`'s header lock (implicitly,
    /// by virtue of having just selected it globally); record it in
    /// the current slot.
    pub fn add_to_ring(&mut self, id: FrameId) {
        self.buffers[self.current] = Some(id);
    }

    /// `StrategyRejectBuffer`: only meaningful for BULKREAD. Returns
    /// true (ask for a different victim) iff the victim just handed
    /// out came from this ring's current slot; blanks that slot so it
    /// won't be re-offered.
    pub fn reject_buffer(&mut self, id: FrameId) -> bool {
        if self.kind != AccessStrategyKind::BulkRead {
            return false;
        }
        if !self.current_was_in_ring || self.buffers[self.current] != Some(id) {
            return false;
        }
        self.buffers[self.current] = None;
        true
    }
}
