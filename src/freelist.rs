//! The freelist: a singly-linked stack of never-touched or explicitly
//! released frames, threaded through `FrameLinks::free_next` and
//! rooted at `StrategyControl::{first,last}_free_buffer`.

use crate::control::StrategyControl;
use crate::frame::{FrameHeaderGuard, FrameTable};
use crate::links::FreeNext;

/// `TryPopFree`: pop frames from the freelist head until one is found
/// with `refcount == 0 && usage_count == 0` while holding its header
/// lock, or the list drains. Frames that fail the check were put on
/// the freelist prematurely by some other caller and are silently
/// discarded rather than handed back or re-pushed.
pub fn try_pop_free<'a>(
    control: &mut StrategyControl,
    frames: &'a FrameTable,
) -> Option<FrameHeaderGuard<'a>> {
    while let Some(id) = control.first_free_buffer {
        let next = control.links[id].free_next.next_id();
        control.first_free_buffer = next;
        if next.is_none() {
            control.last_free_buffer = None;
        }
        control.links[id].free_next = FreeNext::NotInList;

        let guard = frames.lock(id);
        if guard.is_evictable() && guard.usage_count == 0 {
            return Some(guard);
        }
        // refcount > 0 or usage_count > 0: a race with another user
        // already pulled this frame back into service. Drop it and
        // keep scanning.
    }
    None
}

/// `PushFree`: idempotent head-insert. A no-op if `f` is already
/// linked into the freelist.
pub fn push_free(control: &mut StrategyControl, id: usize) {
    if control.links[id].free_next != FreeNext::NotInList {
        return;
    }
    let was_empty = control.first_free_buffer.is_none();
    control.links[id].free_next = match control.first_free_buffer {
        Some(next) => FreeNext::Next(next),
        None => FreeNext::EndOfList,
    };
    control.first_free_buffer = Some(id);
    if was_empty {
        control.last_free_buffer = Some(id);
    }
}
