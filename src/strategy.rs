//! The strategy façade and its initialization/sizing entry points: the
//! public surface callers drive, plus the process-wide state backing
//! it.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use anyhow::{bail, Result};
use parking_lot::{FairMutex, FairMutexGuard};

use crate::control::StrategyControl;
pub use crate::control::Latch;
use crate::error::Error;
use crate::frame::{FrameHeaderGuard, FrameId, FrameTable};
use crate::freelist;
use crate::links::FrameLinks;
use crate::policy::{self, Policy};
use crate::printdbg;
use crate::queue;
use crate::ring::{AccessStrategy, AccessStrategyKind};
use crate::{NUM_BUFFER_PARTITIONS, PAGE_SIZE};

/// A frame handed back by `GetBuffer`: header-locked and with a
/// refcount of zero at the moment of return, and, when it came from the
/// global path (freelist pop or policy scan) rather than an
/// access-strategy ring, still holding the freelist lock for the caller
/// to release after pinning.
pub struct Victim<'a> {
    id: FrameId,
    header: FrameHeaderGuard<'a>,
    control: Option<FairMutexGuard<'a, StrategyControl>>,
}

impl<'a> Victim<'a> {
    pub fn frame_id(&self) -> FrameId {
        self.id
    }

    /// Whether the freelist lock is still held by this value.
    pub fn lock_held(&self) -> bool {
        self.control.is_some()
    }
}

impl<'a> Deref for Victim<'a> {
    type Target = FrameHeaderGuard<'a>;

    fn deref(&self) -> &Self::Target {
        &self.header
    }
}

impl<'a> DerefMut for Victim<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.header
    }
}

/// The three access-strategy kinds a caller may request; `Normal`
/// requests no strategy at all (`NewAccessStrategy` returns `None`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestedStrategy {
    Normal,
    BulkRead,
    BulkWrite,
    Vacuum,
}

/// Process-wide buffer replacement strategy state: the policy
/// selector (a relaxed atomic, read without locking since changing it
/// mid-run only affects which branch the next victim selection takes),
/// the freelist-lock-protected `StrategyControl`, and the header-lock
/// array. In a real deployment all three live in one shared-memory
/// segment; here they live behind ordinary Rust synchronization inside
/// one value, which plays the same role.
pub struct BufferStrategy {
    policy: AtomicU8,
    initialized: AtomicBool,
    control: FairMutex<StrategyControl>,
    frames: FrameTable,
}

impl BufferStrategy {
    /// Allocate (but do not thread the freelist through) a strategy
    /// for `n` frames. Mirrors `SharedAlloc` handing back a
    /// zero-initialized segment before `Initialize` runs.
    pub fn new(n: usize) -> Self {
        Self {
            policy: AtomicU8::new(Policy::default().to_tag()),
            initialized: AtomicBool::new(false),
            control: FairMutex::new(StrategyControl::new(n)),
            frames: FrameTable::new(n),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn policy(&self) -> Policy {
        Policy::from_tag(self.policy.load(Ordering::Relaxed))
            .expect("policy tag is only ever set through Policy::to_tag")
    }

    pub fn set_policy(&self, policy: Policy) {
        self.policy.store(policy.to_tag(), Ordering::Relaxed);
    }

    pub fn policy_name(&self) -> &'static str {
        self.policy().name()
    }

    /// Estimated shared-memory footprint: the control block plus one
    /// `FrameLinks`/`FrameState` pair per frame, plus a
    /// `NUM_BUFFER_PARTITIONS`-sized pad for the page-lookup hash table
    /// that lives alongside this block but is owned elsewhere, so a
    /// caller sizing the full shared-memory segment can add that
    /// table's own estimate on top without this crate reimplementing
    /// it.
    pub fn shmem_size(n: usize) -> usize {
        std::mem::size_of::<StrategyControl>()
            + n * (std::mem::size_of::<FrameLinks>() + std::mem::size_of::<crate::frame::FrameState>())
            + NUM_BUFFER_PARTITIONS * std::mem::size_of::<FrameId>()
    }

    /// One-time setup: thread the full frame array into the freelist,
    /// in order, so the first `get_buffer` pops frame 0. Idempotent for
    /// secondary attachers; fatal if a primary calls it twice.
    pub fn initialize(&self, is_primary: bool) -> Result<()> {
        if self.initialized.swap(true, Ordering::AcqRel) {
            if is_primary {
                bail!(Error::AlreadyInitialized);
            }
            return Ok(());
        }
        let mut control = self.control.lock();
        *control = StrategyControl::new(self.frames.len());
        for id in (0..self.frames.len()).rev() {
            freelist::push_free(&mut control, id);
        }
        printdbg!("buffer strategy initialized: {} frames", self.frames.len());
        Ok(())
    }

    /// `GetBuffer(strategy, &lockHeld)`. Tries the caller's ring first,
    /// then the freelist, then the active policy's victim scan.
    pub fn get_buffer<'a>(
        &'a self,
        strategy: Option<&mut AccessStrategy>,
    ) -> Result<Victim<'a>> {
        if let Some(strategy) = strategy {
            if let Some((id, header)) = strategy.get_from_ring(&self.frames) {
                printdbg!("ring hit: frame {}", id);
                return Ok(Victim {
                    id,
                    header,
                    control: None,
                });
            }

            let mut control = self.control.lock();
            control.num_buffer_allocs += 1;
            self.signal_bgwriter_if_pending(&mut control);

            let (id, header) = self.acquire_from_global_path(&mut control)?;
            strategy.add_to_ring(id);
            printdbg!("ring miss, populated slot with frame {}", id);
            return Ok(Victim {
                id,
                header,
                control: Some(control),
            });
        }

        let mut control = self.control.lock();
        control.num_buffer_allocs += 1;
        self.signal_bgwriter_if_pending(&mut control);

        let (id, header) = self.acquire_from_global_path(&mut control)?;
        Ok(Victim {
            id,
            header,
            control: Some(control),
        })
    }

    /// Freelist pop, falling back to the active policy's victim scan.
    /// Caller holds `control` locked on entry and on every return.
    fn acquire_from_global_path<'a>(
        &'a self,
        control: &mut FairMutexGuard<'a, StrategyControl>,
    ) -> Result<(FrameId, FrameHeaderGuard<'a>)> {
        if let Some(header) = freelist::try_pop_free(control, &self.frames) {
            let id = header.frame_id();
            printdbg!("freelist pop: frame {}", id);
            return Ok((id, header));
        }
        let (id, header) = policy::select_victim(control, &self.frames, self.policy())?;
        printdbg!("policy {} selected victim: frame {}", self.policy_name(), id);
        Ok((id, header))
    }

    /// If a bgwriter wakeup is pending, clear it and signal it with
    /// the freelist lock released around the call: signalling may
    /// schedule other threads and must not happen under a hot lock.
    /// Re-acquires the lock before returning.
    fn signal_bgwriter_if_pending(&self, control: &mut FairMutexGuard<'_, StrategyControl>) {
        let latch = control.bgwriter_latch.take();
        if let Some(latch) = latch {
            FairMutexGuard::unlocked(control, || {
                latch.set();
                printdbg!("bgwriter latch signalled");
            });
        }
    }

    /// `FreeBuffer(f)`: push `f` back onto the freelist. Idempotent.
    pub fn free_buffer(&self, id: FrameId) {
        let mut control = self.control.lock();
        // `f` may still be linked into a victim queue (a page can be
        // dropped outright without ever being re-pinned and unpinned
        // again); splice it out first so it never sits in both a queue
        // and the freelist at once.
        if queue::is_member(control.first_unpinned, &control.links, id) {
            let StrategyControl {
                first_unpinned,
                last_unpinned,
                links,
                ..
            } = &mut *control;
            let mut ends = queue::QueueEnds {
                head: first_unpinned,
                tail: last_unpinned,
            };
            queue::unlink(links, &mut ends, id);
        } else if queue::is_member(control.a1_head, &control.links, id) {
            let StrategyControl {
                a1_head,
                a1_tail,
                links,
                ..
            } = &mut *control;
            let mut ends = queue::QueueEnds {
                head: a1_head,
                tail: a1_tail,
            };
            queue::unlink(links, &mut ends, id);
        }
        freelist::push_free(&mut control, id);
        printdbg!("frame {} released to freelist", id);
    }

    /// `SyncStart(&passes, &allocs)`: CLOCK-hand hint plus an atomic
    /// read-and-reset of the allocation counter.
    pub fn sync_start(&self, passes: Option<&mut u32>, allocs: Option<&mut u32>) -> FrameId {
        let mut control = self.control.lock();
        if let Some(p) = passes {
            *p = control.complete_passes;
        }
        if let Some(a) = allocs {
            *a = control.num_buffer_allocs;
            control.num_buffer_allocs = 0;
        }
        control.next_victim_buffer
    }

    /// `NotifyBgWriter(latch)`: store (or clear) the pending wakeup.
    pub fn notify_bgwriter(&self, latch: Option<Arc<dyn Latch>>) {
        let mut control = self.control.lock();
        control.bgwriter_latch = latch;
    }

    /// Best-effort feed of a just-released frame into the victim
    /// queues. Uses a conditional lock acquisition; on contention it
    /// silently returns, trusting a later CLOCK sweep or queue miss to
    /// catch up.
    pub fn on_unpinned(&self, id: FrameId) {
        if let Some(mut control) = self.control.try_lock() {
            queue::on_unpinned(&mut control, self.policy(), id);
        }
    }

    /// `NewAccessStrategy(type)`: `None` for `Normal`, matching the
    /// original's nil return for callers that want plain global
    /// replacement.
    pub fn new_access_strategy(&self, kind: RequestedStrategy) -> Option<AccessStrategy> {
        let kind = match kind {
            RequestedStrategy::Normal => return None,
            RequestedStrategy::BulkRead => AccessStrategyKind::BulkRead,
            RequestedStrategy::BulkWrite => AccessStrategyKind::BulkWrite,
            RequestedStrategy::Vacuum => AccessStrategyKind::Vacuum,
        };
        Some(AccessStrategy::new(kind, PAGE_SIZE, self.frames.len()))
    }
}

/// Releasing a ring is just dropping the caller-private value; kept as
/// a named entry point to mirror the facade's other operations.
pub fn free_access_strategy(_strategy: AccessStrategy) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct CountingLatch(AtomicUsize);

    impl Latch for CountingLatch {
        fn set(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn get_buffer_pops_freelist_head_first() {
        let strategy = BufferStrategy::new(8);
        strategy.initialize(true).unwrap();

        let victim = strategy.get_buffer(None).unwrap();
        assert_eq!(victim.frame_id(), 0);
        assert!(victim.lock_held());
        assert_eq!(victim.refcount, 0);
        drop(victim);

        let control = strategy.control.lock();
        assert_eq!(control.first_free_buffer, Some(1));
        assert_eq!(control.last_free_buffer, Some(7));
    }

    #[test]
    fn clock_decrements_usage_then_wraps_to_evict_frame_zero() {
        let strategy = BufferStrategy::new(8);
        strategy.initialize(true).unwrap();
        strategy.set_policy(Policy::Clock);

        // Drain the freelist by pinning all 8, give each usage_count 1,
        // then unpin (but unpinning under CLOCK doesn't touch queues,
        // it's only relevant for LRU/MRU/2Q, so just set state directly).
        for _ in 0..8 {
            let v = strategy.get_buffer(None).unwrap();
            drop(v);
        }
        for id in 0..8 {
            strategy.frames.lock(id).usage_count = 1;
        }

        let victim = strategy.get_buffer(None).unwrap();
        assert_eq!(victim.frame_id(), 0);
        drop(victim);

        let control = strategy.control.lock();
        assert_eq!(control.complete_passes, 1);
        assert_eq!(control.next_victim_buffer, 1);
    }

    #[test]
    fn bulkread_ring_reuses_slot_then_rejects_dirty_victim() {
        // N = 32 bounds the BULKREAD ring to N/8 = 4 slots.
        let strategy = BufferStrategy::new(32);
        strategy.initialize(true).unwrap();
        let mut ring = strategy
            .new_access_strategy(RequestedStrategy::BulkRead)
            .unwrap();
        assert_eq!(ring.ring_size(), 4);

        let mut first_four = vec![];
        for _ in 0..4 {
            let v = strategy.get_buffer(Some(&mut ring)).unwrap();
            first_four.push(v.frame_id());
        }
        assert_eq!(first_four.len(), 4);

        let victim = strategy.get_buffer(Some(&mut ring)).unwrap();
        let reused = victim.frame_id();
        assert_eq!(reused, first_four[0]);
        drop(victim);

        assert!(ring.reject_buffer(reused));

        let next = strategy.get_buffer(Some(&mut ring)).unwrap();
        assert_eq!(next.frame_id(), first_four[1]);
    }

    #[test]
    fn bgwriter_latch_is_signalled_exactly_once_per_pending_notify() {
        let strategy = BufferStrategy::new(4);
        strategy.initialize(true).unwrap();
        let latch = Arc::new(CountingLatch(AtomicUsize::new(0)));
        strategy.notify_bgwriter(Some(latch.clone() as Arc<dyn Latch>));

        let v1 = strategy.get_buffer(None).unwrap();
        drop(v1);
        assert_eq!(latch.0.load(Ordering::SeqCst), 1);

        let v2 = strategy.get_buffer(None).unwrap();
        drop(v2);
        assert_eq!(latch.0.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn sync_start_reset_is_atomic_read_and_clear() {
        let strategy = BufferStrategy::new(4);
        strategy.initialize(true).unwrap();
        let _v = strategy.get_buffer(None).unwrap();
        drop(_v);

        let mut allocs = 0u32;
        strategy.sync_start(None, Some(&mut allocs));
        assert_eq!(allocs, 1);

        let mut allocs2 = 0u32;
        strategy.sync_start(None, Some(&mut allocs2));
        assert_eq!(allocs2, 0);
    }

    #[test]
    fn free_buffer_is_idempotent() {
        let strategy = BufferStrategy::new(4);
        strategy.initialize(true).unwrap();
        let victim = strategy.get_buffer(None).unwrap();
        let id = victim.frame_id();
        drop(victim);

        strategy.free_buffer(id);
        let after_first = {
            let control = strategy.control.lock();
            (control.first_free_buffer, control.last_free_buffer)
        };
        strategy.free_buffer(id);
        let after_second = {
            let control = strategy.control.lock();
            (control.first_free_buffer, control.last_free_buffer)
        };
        assert_eq!(after_first, after_second);
    }

    #[test]
    fn initialize_twice_as_primary_is_fatal() {
        let strategy = BufferStrategy::new(4);
        strategy.initialize(true).unwrap();
        assert!(strategy.initialize(true).is_err());
    }

    #[test]
    fn initialize_twice_as_secondary_is_a_no_op() {
        let strategy = BufferStrategy::new(4);
        strategy.initialize(true).unwrap();
        assert!(strategy.initialize(false).is_ok());
    }

    #[test]
    fn shmem_size_grows_with_frame_count() {
        assert!(BufferStrategy::shmem_size(256) > BufferStrategy::shmem_size(16));
    }

    #[test]
    fn new_access_strategy_normal_is_none() {
        let strategy = BufferStrategy::new(8);
        assert!(strategy
            .new_access_strategy(RequestedStrategy::Normal)
            .is_none());
    }

    #[test]
    fn all_frames_pinned_is_no_unpinned_buffers_under_every_policy() {
        for policy in [Policy::Clock, Policy::Lru, Policy::Mru, Policy::TwoQ] {
            let strategy = BufferStrategy::new(4);
            strategy.initialize(true).unwrap();
            strategy.set_policy(policy);
            for _ in 0..4 {
                let mut v = strategy.get_buffer(None).unwrap();
                v.refcount += 1; // simulate the caller pinning it
                drop(v); // release both locks before the next allocation
            }
            assert!(strategy.get_buffer(None).is_err());
        }
    }

    #[test]
    fn free_buffer_unlinks_from_whatever_queue_it_was_in() {
        let strategy = BufferStrategy::new(4);
        strategy.initialize(true).unwrap();
        strategy.set_policy(Policy::Lru);
        strategy.on_unpinned(2); // frame 2 enters the main queue

        strategy.free_buffer(2);

        let control = strategy.control.lock();
        assert!(!queue::is_member(control.first_unpinned, &control.links, 2));
        assert_eq!(control.links[2].prev, None);
        assert_eq!(control.links[2].next, None);
    }

    #[test]
    fn concurrent_allocation_and_release_preserves_partitioning() {
        use rand::Rng;
        use std::sync::Arc;
        use std::thread;

        let n = 64;
        let strategy = Arc::new(BufferStrategy::new(n));
        strategy.initialize(true).unwrap();
        strategy.set_policy(Policy::TwoQ);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let strategy = Arc::clone(&strategy);
                thread::spawn(move || {
                    let mut rng = rand::thread_rng();
                    for _ in 0..200 {
                        let id = match strategy.get_buffer(None) {
                            Ok(mut v) => {
                                v.refcount += 1;
                                v.frame_id()
                            }
                            Err(_) => continue, // every frame momentarily pinned elsewhere
                        };
                        // simulate the caller's own unpin, then decide
                        // whether to feed the queues or drop the page
                        // outright.
                        strategy.frames.lock(id).refcount -= 1;
                        if rng.gen_bool(0.5) {
                            strategy.on_unpinned(id);
                        }
                        strategy.free_buffer(id);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // every frame must be reachable again: draining the freelist
        // and every queue by repeated allocation must yield exactly n
        // distinct frames with no duplicates and no missing index.
        let mut seen = vec![false; n];
        for _ in 0..n {
            let mut v = strategy.get_buffer(None).unwrap();
            v.refcount += 1;
            let id = v.frame_id();
            assert!(!seen[id], "frame {id} handed out twice");
            seen[id] = true;
        }
        assert!(seen.iter().all(|&s| s), "every frame must be accounted for");
    }
}
