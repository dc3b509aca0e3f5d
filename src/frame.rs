use std::ops::{Deref, DerefMut};

use parking_lot::{Mutex, MutexGuard};

/// Index of a frame in the buffer pool, 0..N-1.
pub type FrameId = usize;

/// The per-frame fields protected by the header (spin)lock: `refcount`
/// (pin count; zero means no user) and `usage_count` (CLOCK's recency
/// approximation, externally incremented on access and decremented by
/// the CLOCK hand). Everything else about a frame — its page content,
/// dirty bit, and the pin/unpin primitives that mutate `refcount` —
/// belongs to the surrounding descriptor table and is out of scope
/// here; this crate only reads `refcount` and reads/writes
/// `usage_count`.
#[derive(Debug, Default, Clone, Copy)]
pub struct FrameState {
    pub refcount: u32,
    pub usage_count: u8,
}

impl FrameState {
    fn is_evictable(&self) -> bool {
        self.refcount == 0
    }
}

/// Header-lock array for the frame table: one short-lived spinlock per
/// frame, leaf locks never held while holding another header lock.
#[derive(Debug)]
pub struct FrameTable {
    headers: Vec<Mutex<FrameState>>,
}

impl FrameTable {
    pub fn new(n: usize) -> Self {
        Self {
            headers: (0..n).map(|_| Mutex::new(FrameState::default())).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    /// `LockFrameHeader` + `FrameDescriptor(i)`: acquire the header
    /// spinlock for frame `id` and hand back a guard through which its
    /// `refcount`/`usage_count` can be inspected or, for `usage_count`,
    /// mutated.
    pub fn lock(&self, id: FrameId) -> FrameHeaderGuard<'_> {
        FrameHeaderGuard {
            id,
            guard: self.headers[id].lock(),
        }
    }

    /// Non-blocking variant, used where a caller must not stall behind
    /// a momentarily-held header lock.
    pub fn try_lock(&self, id: FrameId) -> Option<FrameHeaderGuard<'_>> {
        self.headers[id]
            .try_lock()
            .map(|guard| FrameHeaderGuard { id, guard })
    }
}

/// A held frame header lock. `FrameIndex(f)` is `guard.frame_id()`;
/// dropping the guard is `UnlockFrameHeader(f)`.
pub struct FrameHeaderGuard<'a> {
    id: FrameId,
    guard: MutexGuard<'a, FrameState>,
}

impl<'a> FrameHeaderGuard<'a> {
    pub fn frame_id(&self) -> FrameId {
        self.id
    }

    pub fn is_evictable(&self) -> bool {
        self.guard.is_evictable()
    }
}

impl<'a> Deref for FrameHeaderGuard<'a> {
    type Target = FrameState;

    fn deref(&self) -> &FrameState {
        &self.guard
    }
}

impl<'a> DerefMut for FrameHeaderGuard<'a> {
    fn deref_mut(&mut self) -> &mut FrameState {
        &mut self.guard
    }
}
