use crate::frame::FrameId;

/// `freeNext`'s three states. A plain `Option<FrameId>` can't tell "not
/// linked into the freelist at all" apart from "linked in, but I'm the
/// tail" — both would read `None`. The original keeps those as two
/// distinct sentinel constants (`FREENEXT_NOT_IN_LIST` /
/// `FREENEXT_END_OF_LIST`) for exactly that reason; this is the same
/// distinction spelled out as an enum instead of two magic negatives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FreeNext {
    #[default]
    NotInList,
    EndOfList,
    Next(FrameId),
}

impl FreeNext {
    pub fn next_id(self) -> Option<FrameId> {
        match self {
            FreeNext::Next(id) => Some(id),
            FreeNext::NotInList | FreeNext::EndOfList => None,
        }
    }
}

/// The per-frame fields protected by the freelist lock rather than the
/// per-frame header lock: `freeNext` and the
/// main/A1 doubly-linked-list `prev`/`next` pointers. For `prev`/`next`,
/// `None` is the ordinary "no neighbour on this side" value (head has
/// `prev = None`, tail has `next = None`); list membership for those
/// two is decided by comparing against `StrategyControl`'s head/tail
/// pointers, not by these fields alone (see `queue.rs`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameLinks {
    pub free_next: FreeNext,
    pub prev: Option<FrameId>,
    pub next: Option<FrameId>,
}

/// A fixed-size array of `FrameLinks`, one per frame, always accessed
/// under the freelist lock (it lives inside `StrategyControl`).
#[derive(Debug)]
pub struct LinkTable {
    links: Vec<FrameLinks>,
}

impl LinkTable {
    pub fn new(n: usize) -> Self {
        Self {
            links: vec![FrameLinks::default(); n],
        }
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }
}

impl std::ops::Index<FrameId> for LinkTable {
    type Output = FrameLinks;

    fn index(&self, id: FrameId) -> &FrameLinks {
        &self.links[id]
    }
}

impl std::ops::IndexMut<FrameId> for LinkTable {
    fn index_mut(&mut self, id: FrameId) -> &mut FrameLinks {
        &mut self.links[id]
    }
}
