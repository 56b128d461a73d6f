//! # tst-rs
//!
//! A compact ternary search tree mapping short strings to `u16` values.
//!
//! Built for tables of tens of thousands of short keys, such as TeX
//! hyphenation patterns, where memory is the main concern:
//!
//! - Nodes live in four `u16` columns (8 bytes per node) addressed by
//!   16-bit handles.
//! - A branch holding a single key is stored as one node plus the rest of
//!   the key in a shared tail buffer. It is decompressed one unit at a time
//!   only when another key needs to branch inside it.
//! - [`TernaryTree::trim_to_size`] rebalances the tree, then drops unused
//!   capacity and deduplicates the tail buffer.
//!
//! ## Example
//!
//! ```rust
//! use tst_rs::TernaryTree;
//!
//! let mut tree = TernaryTree::new();
//! tree.insert("Carlos", u16::from(b'C')).unwrap();
//! tree.insert("Car", u16::from(b'r')).unwrap();
//! tree.trim_to_size().unwrap();
//!
//! assert_eq!(tree.find("Car"), Some(u16::from(b'r')));
//! assert_eq!(tree.find("Carl"), None);
//! assert_eq!(tree.keys().collect::<Vec<_>>(), vec!["Car", "Carlos"]);
//! ```
//!
//! ## Threading
//!
//! All operations are synchronous. Build with a single writer, finalize with
//! `trim_to_size`, then share `&TernaryTree` freely: lookups and iteration
//! never mutate. Interleaving writes with reads needs external locking.

mod arena;
mod config;
mod error;
mod iter;
mod tail;

use std::fmt;

use tracing::debug;

use arena::{Handle, Link, Node, NodeArena, NIL};
use tail::TailBuffer;

pub use config::{TreeConfig, DEFAULT_BLOCK_SIZE};
pub use error::{Result, TreeError};
pub use iter::{Iter, Keys};

/// Reserved unit marking the end of a key. Keys must not contain it.
pub const TERMINATOR: u16 = 0x0000;

/// Reserved unit marking a compressed node. Keys must not contain it.
pub const COMPRESSED: u16 = 0xFFFF;

// =============================================================================
// TernaryTree
// =============================================================================

/// A ternary search tree with branch compression.
///
/// Keys are sequences of UTF-16 code units excluding [`TERMINATOR`] and
/// [`COMPRESSED`]; every `&str` method has a `*_units` twin taking raw
/// units. Values use the full `u16` range.
///
/// Capacity is bounded by the 16-bit handles: at most 65,535 nodes and
/// 65,536 tail units. Running out is reported as a [`TreeError`].
#[derive(Clone)]
pub struct TernaryTree {
    nodes: NodeArena,
    tail: TailBuffer,
    root: Handle,
    count: usize,
    config: TreeConfig,
}

impl TernaryTree {
    pub fn new() -> Self {
        Self::with_config(TreeConfig::default())
    }

    pub fn with_config(config: TreeConfig) -> Self {
        Self {
            nodes: NodeArena::new(config.node_step()),
            tail: TailBuffer::new(config.tail_step()),
            root: NIL,
            count: 0,
            config,
        }
    }

    #[inline]
    pub fn config(&self) -> TreeConfig {
        self.config
    }

    /// Number of distinct keys.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Allocated nodes, excluding the sentinel slot.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.nodes.node_count()
    }

    /// Units used in the tail buffer, terminators and garbage included.
    #[inline]
    pub fn tail_len(&self) -> usize {
        self.tail.len()
    }

    /// Heap bytes held by the node columns and the tail buffer.
    pub fn memory_usage(&self) -> usize {
        self.nodes.memory_usage() + self.tail.memory_usage()
    }

    pub fn stats(&self) -> TreeStats {
        TreeStats {
            keys: self.count,
            nodes: self.nodes.node_count(),
            node_capacity: self.nodes.capacity(),
            tail_len: self.tail.len(),
            tail_capacity: self.tail.capacity(),
            memory_bytes: self.memory_usage(),
        }
    }

    /// Insert `key`, returning the previous value if it was already present.
    pub fn insert(&mut self, key: &str, value: u16) -> Result<Option<u16>> {
        let units: Vec<u16> = key.encode_utf16().collect();
        self.insert_units(&units, value)
    }

    /// Insert a key given as code units.
    ///
    /// On error the keys, nodes and tail contents are exactly as they were
    /// before the call; only reserved capacity may have grown.
    pub fn insert_units(&mut self, key: &[u16], value: u16) -> Result<Option<u16>> {
        debug_assert!(
            !key.iter().any(|&u| u == TERMINATOR || u == COMPRESSED),
            "key contains a reserved unit"
        );
        // Worst case: one node per unit plus the terminal.
        self.nodes.reserve(key.len() + 1)?;

        let node_mark = self.nodes.cursor();
        let tail_mark = self.tail.len();
        let mut undo = Vec::new();
        match self.insert_path(key, value, &mut undo) {
            Ok(previous) => Ok(previous),
            Err(e) => {
                for (h, node) in undo.into_iter().rev() {
                    self.nodes.set(h, node);
                }
                self.nodes.release_to(node_mark);
                self.tail.truncate(tail_mark);
                Err(e)
            }
        }
    }

    /// Walk down from the root and place `key`, without recursion.
    ///
    /// Existing nodes rewritten by decompression are logged in `undo` with
    /// their old contents. The new leaf is linked into its parent only after
    /// every allocation has succeeded.
    fn insert_path(
        &mut self,
        mut key: &[u16],
        value: u16,
        undo: &mut Vec<(Handle, Node)>,
    ) -> Result<Option<u16>> {
        let mut parent: Option<(Handle, Link)> = None;
        let mut p = self.root;

        loop {
            if p == NIL {
                // New branch: one node, with the rest of the key stored out of line.
                let node = if key.is_empty() {
                    Node::Terminal { value, high: NIL }
                } else {
                    Node::Compressed {
                        tail: self.tail.store(key)?,
                        value,
                    }
                };
                let leaf = self.nodes.allocate()?;
                self.nodes.set(leaf, node);
                match parent {
                    Some((h, link)) => self.nodes.set_link(h, link, leaf),
                    None => self.root = leaf,
                }
                self.count += 1;
                return Ok(None);
            }

            match self.nodes.node(p) {
                old @ Node::Compressed { tail, value: stored } => {
                    // The old tail moves to a new node `q`; `p` stays where its parent points.
                    let q = self.nodes.allocate()?;
                    undo.push((p, old));
                    if key.is_empty() {
                        // The new key ends here: `p` becomes its terminal and the
                        // compressed branch, which sorts above it, hangs off `high`.
                        self.nodes.set(q, old);
                        self.nodes.set(p, Node::Terminal { value, high: q });
                        self.count += 1;
                        return Ok(None);
                    }
                    let rest = tail + 1;
                    let continuation = if self.tail.get(rest) == TERMINATOR {
                        Node::Terminal {
                            value: stored,
                            high: NIL,
                        }
                    } else {
                        Node::Compressed {
                            tail: rest,
                            value: stored,
                        }
                    };
                    self.nodes.set(q, continuation);
                    self.nodes.set(
                        p,
                        Node::Branch {
                            split: self.tail.get(tail),
                            low: NIL,
                            equal: q,
                            high: NIL,
                        },
                    );
                    // Visit `p` again, now as a branch.
                }
                Node::Terminal { value: stored, high } => {
                    if key.is_empty() {
                        self.nodes.set(p, Node::Terminal { value, high });
                        return Ok(Some(stored));
                    }
                    parent = Some((p, Link::High));
                    p = high;
                }
                Node::Branch {
                    split,
                    low,
                    equal,
                    high,
                } => {
                    let c = key.first().copied().unwrap_or(TERMINATOR);
                    let (link, next) = match c.cmp(&split) {
                        std::cmp::Ordering::Less => (Link::Low, low),
                        std::cmp::Ordering::Equal => {
                            key = &key[1..];
                            (Link::Equal, equal)
                        }
                        std::cmp::Ordering::Greater => (Link::High, high),
                    };
                    parent = Some((p, link));
                    p = next;
                }
            }
        }
    }

    pub fn find(&self, key: &str) -> Option<u16> {
        let units: Vec<u16> = key.encode_utf16().collect();
        self.find_units(&units)
    }

    pub fn find_units(&self, key: &[u16]) -> Option<u16> {
        let mut p = self.root;
        let mut i = 0usize;
        while p != NIL {
            match self.nodes.node(p) {
                Node::Compressed { tail, value } => {
                    return self.tail.matches(tail, &key[i..]).then_some(value);
                }
                Node::Terminal { value, high } => {
                    if i == key.len() {
                        return Some(value);
                    }
                    p = high;
                }
                Node::Branch {
                    split,
                    low,
                    equal,
                    high,
                } => {
                    let c = key.get(i).copied().unwrap_or(TERMINATOR);
                    match c.cmp(&split) {
                        std::cmp::Ordering::Less => p = low,
                        std::cmp::Ordering::Equal => {
                            i += 1;
                            p = equal;
                        }
                        std::cmp::Ordering::Greater => p = high,
                    }
                }
            }
        }
        None
    }

    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.find(key).is_some()
    }

    #[inline]
    pub fn contains_units(&self, key: &[u16]) -> bool {
        self.find_units(key).is_some()
    }

    /// Rebuild the tree by inserting the median key of each sorted range first.
    ///
    /// The rebuild happens in a fresh tree, so a failure leaves `self` as it was.
    pub fn balance(&mut self) -> Result<()> {
        let entries: Vec<(Vec<u16>, u16)> = self.iter().collect();
        let mut rebuilt = Self::with_config(self.config);
        rebuilt.insert_balanced(&entries)?;
        debug!(
            keys = entries.len(),
            nodes_before = self.nodes.node_count(),
            nodes_after = rebuilt.nodes.node_count(),
            "balanced tree"
        );
        *self = rebuilt;
        Ok(())
    }

    fn insert_balanced(&mut self, entries: &[(Vec<u16>, u16)]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let m = entries.len() / 2;
        let (key, value) = &entries[m];
        self.insert_units(key, *value)?;
        self.insert_balanced(&entries[..m])?;
        self.insert_balanced(&entries[m + 1..])
    }

    /// Drop unused node capacity and rebuild the tail buffer without garbage
    /// or duplicate suffixes.
    ///
    /// Meant to run once, after [`balance`](Self::balance), before the tree
    /// is shared for reads. On error the tree is unchanged.
    pub fn compact(&mut self) -> Result<()> {
        let mut packed = TailBuffer::new(self.config.tail_step());
        // Suffix -> offset in `packed`.
        let mut index = TernaryTree::with_config(self.config);
        let mut relocated = Vec::new();

        for h in self.nodes.handles() {
            let Node::Compressed { tail, value } = self.nodes.node(h) else {
                continue;
            };
            let suffix = self.tail.tail(tail);
            let off = match index.find_units(suffix) {
                Some(off) => off,
                None => {
                    let off = packed.store(suffix)?;
                    index.insert_units(suffix, off)?;
                    off
                }
            };
            relocated.push((h, Node::Compressed { tail: off, value }));
        }

        for (h, node) in relocated {
            self.nodes.set(h, node);
        }
        self.nodes.shrink_to_fit();
        packed.trim_to_exact();
        debug!(
            nodes = self.nodes.node_count(),
            tail_before = self.tail.len(),
            tail_after = packed.len(),
            distinct_suffixes = index.len(),
            "compacted tree"
        );
        self.tail = packed;
        Ok(())
    }

    /// [`balance`](Self::balance) followed by [`compact`](Self::compact).
    pub fn trim_to_size(&mut self) -> Result<()> {
        self.balance()?;
        self.compact()
    }

    /// Entries in ascending key order.
    pub fn iter(&self) -> Iter<'_> {
        Iter::new(self)
    }

    /// Keys in ascending order, decoded to `String`.
    pub fn keys(&self) -> Keys<'_> {
        Keys::new(self)
    }
}

impl Default for TernaryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TernaryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.iter().map(|(k, v)| (String::from_utf16_lossy(&k), v)))
            .finish()
    }
}

impl<'a> IntoIterator for &'a TernaryTree {
    type Item = (Vec<u16>, u16);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

// =============================================================================
// Diagnostics
// =============================================================================

/// Size counters for tooling. Not part of the lookup contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeStats {
    pub keys: usize,
    pub nodes: usize,
    pub node_capacity: usize,
    pub tail_len: usize,
    pub tail_capacity: usize,
    pub memory_bytes: usize,
}

impl fmt::Display for TreeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Number of keys = {}", self.keys)?;
        writeln!(f, "Node count = {} (capacity {})", self.nodes, self.node_capacity)?;
        writeln!(
            f,
            "Key array length = {} (capacity {})",
            self.tail_len, self.tail_capacity
        )?;
        write!(f, "Memory = {} bytes", self.memory_bytes)
    }
}


#[cfg(test)]
mod proptests;
