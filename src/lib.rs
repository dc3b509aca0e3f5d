//! Buffer replacement strategy core.
//!
//! This crate implements the victim-selection half of a database
//! storage manager's buffer pool: given a fixed-size array of frames
//! shared by many concurrent workers, it decides which frame to hand
//! out next and how a released frame feeds back into eviction
//! bookkeeping. It does not own page contents, perform I/O, or know
//! what "dirty" means beyond a caller-supplied bit; those live in the
//! surrounding storage manager.

mod error;
mod frame;
mod links;
mod control;
mod freelist;
mod queue;
mod policy;
mod ring;
mod strategy;

pub use error::Error;
pub use frame::{FrameHeaderGuard, FrameId, FrameState, FrameTable};
pub use policy::Policy;
pub use ring::{AccessStrategy, AccessStrategyKind};
pub use strategy::{free_access_strategy, BufferStrategy, Latch, RequestedStrategy, Victim};

/// Page size in bytes, used only for sizing access-strategy rings and
/// `shmem_size` estimates; this crate never reads or writes page
/// contents.
pub const PAGE_SIZE: usize = 4096; // 4 KBs

/// Number of partitions the external page-lookup hash table uses.
/// Kept here only so `shmem_size` can size a segment large enough for
/// that (out-of-scope) collaborator too.
pub const NUM_BUFFER_PARTITIONS: usize = 16;

#[macro_export]
macro_rules! printdbg {
    ($val: expr $(, $args: expr)*) => {
        #[cfg(debug_assertions)]
        println!($val $(, $args)*)
    };
}
