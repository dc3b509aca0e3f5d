//! Victim queues: the main (LRU/MRU/CLOCK-feed, 2Q hot) queue and the
//! 2Q probation (A1) queue. Both are doubly-linked lists threaded
//! through `FrameLinks::{prev,next}`, mutated only under the freelist
//! lock.

use crate::control::StrategyControl;
use crate::frame::FrameId;
use crate::links::LinkTable;
use crate::policy::Policy;

/// Borrowed head/tail pointers for one of the two queues, so the
/// splice primitives below don't need to know which queue they're
/// operating on. Built from already-disjoint field borrows (never
/// from a whole `&mut StrategyControl`) so it can coexist with a
/// separate `&mut LinkTable` borrow of the same struct.
pub(crate) struct QueueEnds<'a> {
    pub head: &'a mut Option<FrameId>,
    pub tail: &'a mut Option<FrameId>,
}

/// Whether `id` is currently linked into the queue described by
/// `head`/`links`. A lone element has `prev = next = None` but is
/// still a member iff it's the head.
pub(crate) fn is_member(head: Option<FrameId>, links: &LinkTable, id: FrameId) -> bool {
    head == Some(id) || links[id].prev.is_some() || links[id].next.is_some()
}

/// Number of frames linked into a queue, found by walking `next`
/// pointers from `head`. This is O(queue length); an explicit counter
/// field would be a valid optimization but isn't needed at this scale.
pub(crate) fn list_len(head: Option<FrameId>, links: &LinkTable) -> usize {
    let mut len = 0;
    let mut cur = head;
    while let Some(id) = cur {
        len += 1;
        cur = links[id].next;
    }
    len
}

/// Splice `id` out of its queue. Four-case removal: middle / head /
/// tail / singleton. Caller must have already established that `id`
/// is a member.
pub(crate) fn unlink(links: &mut LinkTable, ends: &mut QueueEnds, id: FrameId) {
    let prev = links[id].prev;
    let next = links[id].next;
    match (prev, next) {
        (Some(p), Some(n)) => {
            links[p].next = Some(n);
            links[n].prev = Some(p);
        }
        (Some(p), None) => {
            links[p].next = None;
            *ends.tail = Some(p);
        }
        (None, Some(n)) => {
            links[n].prev = None;
            *ends.head = Some(n);
        }
        (None, None) => {
            *ends.head = None;
            *ends.tail = None;
        }
    }
    links[id].prev = None;
    links[id].next = None;
}

/// Append `id` to the tail of a queue. Caller must ensure `id` isn't
/// already linked anywhere.
pub(crate) fn push_tail(links: &mut LinkTable, ends: &mut QueueEnds, id: FrameId) {
    links[id].prev = *ends.tail;
    links[id].next = None;
    match *ends.tail {
        Some(t) => links[t].next = Some(id),
        None => *ends.head = Some(id),
    }
    *ends.tail = Some(id);
}

fn move_to_tail(links: &mut LinkTable, ends: &mut QueueEnds, id: FrameId) {
    if is_member(*ends.head, links, id) {
        unlink(links, ends, id);
    }
    push_tail(links, ends, id);
}

/// `OnUnpinned`: feed a just-released frame into the victim queues.
/// Assumes the freelist lock is already held (the conditional-acquire
/// best-effort semantics live in `strategy::BufferStrategy::on_unpinned`).
pub(crate) fn on_unpinned(control: &mut StrategyControl, policy: Policy, id: FrameId) {
    let StrategyControl {
        first_unpinned,
        last_unpinned,
        a1_head,
        a1_tail,
        links,
        ..
    } = control;

    match policy {
        Policy::Clock | Policy::Lru | Policy::Mru => {
            let mut main = QueueEnds {
                head: first_unpinned,
                tail: last_unpinned,
            };
            move_to_tail(links, &mut main, id);
        }
        Policy::TwoQ => {
            if is_member(*first_unpinned, links, id) {
                let mut main = QueueEnds {
                    head: first_unpinned,
                    tail: last_unpinned,
                };
                move_to_tail(links, &mut main, id);
                return;
            }
            if is_member(*a1_head, links, id) {
                let mut a1 = QueueEnds {
                    head: a1_head,
                    tail: a1_tail,
                };
                unlink(links, &mut a1, id);
                let mut main = QueueEnds {
                    head: first_unpinned,
                    tail: last_unpinned,
                };
                push_tail(links, &mut main, id);
                return;
            }
            let mut a1 = QueueEnds {
                head: a1_head,
                tail: a1_tail,
            };
            push_tail(links, &mut a1, id);
        }
    }
}
