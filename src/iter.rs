//! Ordered traversal without recursion.
//!
//! The iterator keeps its own stack of frames, so a tree skewed by sorted
//! insertion or by repeated decompression cannot overflow the call stack.

use std::iter::FusedIterator;

use crate::arena::{Handle, Node, NIL};
use crate::TernaryTree;

/// Which part of a node the traversal visits next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Visit {
    Low,
    Equal,
    High,
}

#[derive(Clone, Copy, Debug)]
struct Frame {
    node: Handle,
    next: Visit,
}

/// Iterator over `(key, value)` pairs in ascending key order.
///
/// Keys are yielded as UTF-16 code units. See [`TernaryTree::keys`] for
/// decoded strings.
#[derive(Clone)]
pub struct Iter<'a> {
    tree: &'a TernaryTree,
    stack: Vec<Frame>,
    /// Split units on the path from the root to the current frame.
    path: Vec<u16>,
    /// Entry produced by a compressed root, before any frame exists.
    pending: Option<(Vec<u16>, u16)>,
}

impl<'a> Iter<'a> {
    pub(crate) fn new(tree: &'a TernaryTree) -> Self {
        let mut iter = Self {
            tree,
            stack: Vec::new(),
            path: Vec::new(),
            pending: None,
        };
        iter.rewind();
        iter
    }

    /// Restart from the smallest key, whatever has been consumed so far.
    pub fn rewind(&mut self) {
        self.stack.clear();
        self.path.clear();
        self.pending = self.descend(self.tree.root);
    }

    /// Enter `h`. A compressed leaf is emitted whole instead of being pushed.
    fn descend(&mut self, h: Handle) -> Option<(Vec<u16>, u16)> {
        if h == NIL {
            return None;
        }
        match self.tree.nodes.node(h) {
            Node::Compressed { tail, value } => {
                let suffix = self.tree.tail.tail(tail);
                let mut key = Vec::with_capacity(self.path.len() + suffix.len());
                key.extend_from_slice(&self.path);
                key.extend_from_slice(suffix);
                Some((key, value))
            }
            _ => {
                self.stack.push(Frame {
                    node: h,
                    next: Visit::Low,
                });
                None
            }
        }
    }
}

impl<'a> Iterator for Iter<'a> {
    type Item = (Vec<u16>, u16);

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(entry) = self.pending.take() {
            return Some(entry);
        }

        while let Some(frame) = self.stack.pop() {
            let node = self.tree.nodes.node(frame.node);
            match frame.next {
                Visit::Low => {
                    self.stack.push(Frame {
                        next: Visit::Equal,
                        ..frame
                    });
                    if let Node::Branch { low, .. } = node {
                        if let Some(entry) = self.descend(low) {
                            return Some(entry);
                        }
                    }
                }
                Visit::Equal => {
                    self.stack.push(Frame {
                        next: Visit::High,
                        ..frame
                    });
                    match node {
                        Node::Terminal { value, .. } => return Some((self.path.clone(), value)),
                        Node::Branch { split, equal, .. } => {
                            self.path.push(split);
                            if let Some(entry) = self.descend(equal) {
                                return Some(entry);
                            }
                        }
                        Node::Compressed { .. } => {}
                    }
                }
                Visit::High => match node {
                    Node::Branch { high, .. } => {
                        self.path.pop();
                        if let Some(entry) = self.descend(high) {
                            return Some(entry);
                        }
                    }
                    Node::Terminal { high, .. } => {
                        if let Some(entry) = self.descend(high) {
                            return Some(entry);
                        }
                    }
                    Node::Compressed { .. } => {}
                },
            }
        }
        None
    }
}

impl FusedIterator for Iter<'_> {}

/// Iterator over keys in ascending order, decoded from UTF-16.
///
/// Unpaired surrogates are replaced with U+FFFD.
#[derive(Clone)]
pub struct Keys<'a> {
    inner: Iter<'a>,
}

impl<'a> Keys<'a> {
    pub(crate) fn new(tree: &'a TernaryTree) -> Self {
        Self {
            inner: Iter::new(tree),
        }
    }

    pub fn rewind(&mut self) {
        self.inner.rewind();
    }
}

impl Iterator for Keys<'_> {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        self.inner
            .next()
            .map(|(key, _)| String::from_utf16_lossy(&key))
    }
}

impl FusedIterator for Keys<'_> {}
