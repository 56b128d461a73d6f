//! Columnar node storage.
//!
//! Every node occupies one slot in each of four `u16` columns:
//!
//! ```text
//! split  | low          | equal        | high
//! -------+--------------+--------------+-------
//! c      | child        | child        | child     Branch
//! 0x0000 | 0            | value        | child     Terminal
//! 0xFFFF | tail offset  | value        | 0         Compressed
//! ```
//!
//! The `split` column is the discriminant. Callers never see the raw
//! columns: they read and write the decoded [`Node`] view.

use tracing::{trace, warn};

use crate::error::{Result, TreeError};
use crate::{COMPRESSED, TERMINATOR};

/// Index of a node in the arena. `0` is never allocated.
pub(crate) type Handle = u16;

/// The absent node.
pub(crate) const NIL: Handle = 0;

/// Column length limit (the sentinel slot included).
pub(crate) const MAX_NODES: usize = u16::MAX as usize + 1;

/// Which child slot of a node holds a link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Link {
    Low,
    Equal,
    High,
}

/// Decoded view of one arena slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Node {
    /// Three-way split on an ordinary key unit.
    Branch {
        split: u16,
        low: Handle,
        equal: Handle,
        high: Handle,
    },
    /// End of a key. Nothing sorts below the terminator, so there is no low child.
    Terminal { value: u16, high: Handle },
    /// Leaf whose remaining key units live in the tail buffer at `tail`.
    Compressed { tail: u16, value: u16 },
}

#[derive(Clone)]
pub(crate) struct NodeArena {
    split: Vec<u16>,
    low: Vec<u16>,
    equal: Vec<u16>,
    high: Vec<u16>,
    /// Next handle to hand out.
    free: usize,
    block: usize,
}

impl NodeArena {
    pub(crate) fn new(block: usize) -> Self {
        Self {
            split: Vec::new(),
            low: Vec::new(),
            equal: Vec::new(),
            high: Vec::new(),
            free: 1,
            block: block.max(1),
        }
    }

    /// Allocation cursor: live nodes plus the sentinel.
    pub(crate) fn cursor(&self) -> usize {
        self.free
    }

    #[inline]
    pub(crate) fn node_count(&self) -> usize {
        self.free - 1
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.split.len()
    }

    pub(crate) fn memory_usage(&self) -> usize {
        (self.split.capacity() + self.low.capacity() + self.equal.capacity() + self.high.capacity())
            * std::mem::size_of::<u16>()
    }

    /// Every allocated handle, in allocation order.
    pub(crate) fn handles(&self) -> impl Iterator<Item = Handle> {
        (1..self.free).map(|h| h as Handle)
    }

    fn columns_mut(&mut self) -> [&mut Vec<u16>; 4] {
        [
            &mut self.split,
            &mut self.low,
            &mut self.equal,
            &mut self.high,
        ]
    }

    /// Make room for `n` more nodes, growing in whole blocks.
    ///
    /// Growth stops at [`MAX_NODES`]; running past it is reported by
    /// [`allocate`](Self::allocate), not here, so that operations which end
    /// up needing fewer nodes than the worst case still succeed.
    pub(crate) fn reserve(&mut self, n: usize) -> Result<()> {
        let needed = self.free + n;
        let cap = self.capacity();
        if needed <= cap {
            return Ok(());
        }
        let blocks = (needed - cap).div_ceil(self.block);
        let target = (cap + blocks * self.block).min(MAX_NODES);
        if target <= cap {
            return Ok(());
        }
        self.grow_to(target)
    }

    fn grow_to(&mut self, n: usize) -> Result<()> {
        let from = self.capacity();
        debug_assert!(n > from);
        for col in self.columns_mut() {
            col.try_reserve_exact(n - col.len())?;
        }
        for col in self.columns_mut() {
            col.resize(n, 0);
        }
        trace!(from, to = n, "node arena grown");
        Ok(())
    }

    pub(crate) fn allocate(&mut self) -> Result<Handle> {
        if self.free >= MAX_NODES {
            warn!(nodes = self.node_count(), "node arena exhausted");
            return Err(TreeError::NodeCapacity {
                requested: self.free,
                limit: MAX_NODES - 1,
            });
        }
        if self.free >= self.capacity() {
            self.reserve(1)?;
        }
        let h = self.free as Handle;
        self.free += 1;
        Ok(h)
    }

    #[inline]
    pub(crate) fn node(&self, h: Handle) -> Node {
        debug_assert!(h != NIL && (h as usize) < self.free);
        let i = h as usize;
        match self.split[i] {
            TERMINATOR => Node::Terminal {
                value: self.equal[i],
                high: self.high[i],
            },
            COMPRESSED => Node::Compressed {
                tail: self.low[i],
                value: self.equal[i],
            },
            split => Node::Branch {
                split,
                low: self.low[i],
                equal: self.equal[i],
                high: self.high[i],
            },
        }
    }

    #[inline]
    pub(crate) fn set(&mut self, h: Handle, node: Node) {
        debug_assert!(h != NIL && (h as usize) < self.free);
        let (split, low, equal, high) = match node {
            Node::Branch {
                split,
                low,
                equal,
                high,
            } => {
                debug_assert!(split != TERMINATOR && split != COMPRESSED);
                (split, low, equal, high)
            }
            Node::Terminal { value, high } => (TERMINATOR, NIL, value, high),
            Node::Compressed { tail, value } => (COMPRESSED, tail, value, NIL),
        };
        let i = h as usize;
        self.split[i] = split;
        self.low[i] = low;
        self.equal[i] = equal;
        self.high[i] = high;
    }

    /// Point one child slot of `h` at `child`, leaving the rest of the node alone.
    #[inline]
    pub(crate) fn set_link(&mut self, h: Handle, link: Link, child: Handle) {
        debug_assert!(h != NIL && (h as usize) < self.free);
        debug_assert!(
            !matches!(self.split[h as usize], TERMINATOR | COMPRESSED) || link == Link::High,
            "only branches have low and equal links"
        );
        let col = match link {
            Link::Low => &mut self.low,
            Link::Equal => &mut self.equal,
            Link::High => &mut self.high,
        };
        col[h as usize] = child;
    }

    /// Forget every node allocated at or after `cursor`.
    pub(crate) fn release_to(&mut self, cursor: usize) {
        debug_assert!(cursor >= 1 && cursor <= self.free);
        self.free = cursor;
    }

    /// Size every column to exactly the allocation cursor.
    pub(crate) fn shrink_to_fit(&mut self) {
        let free = self.free;
        for col in self.columns_mut() {
            col.resize(free, 0);
            col.shrink_to_fit();
        }
    }
}
