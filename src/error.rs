#[derive(Debug)]
pub enum Error {
    /// Every candidate the active policy was willing to scan had a
    /// nonzero refcount (or, for CLOCK, a full cycle made no progress).
    NoUnpinnedBuffers,
    /// The policy selector held a value with no matching branch.
    InvalidPolicy(u8),
    /// `Initialize` was called a second time by a primary attacher.
    AlreadyInitialized,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::NoUnpinnedBuffers => write!(f, "no unpinned buffers available"),
            Error::InvalidPolicy(tag) => write!(f, "invalid buffer pool replacement policy {tag}"),
            Error::AlreadyInitialized => {
                write!(f, "strategy control block already initialized by a primary")
            }
        }
    }
}

impl std::error::Error for Error {}
