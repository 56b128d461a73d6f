//! Growth configuration.

/// Default growth step for both the node arena and the tail buffer.
pub const DEFAULT_BLOCK_SIZE: usize = 2048;

/// Configuration for a [`TernaryTree`](crate::TernaryTree).
///
/// Storage grows in fixed blocks rather than one element at a time, so a
/// long run of inserts copies the columns only every `node_block` nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeConfig {
    /// Nodes added to the arena per growth step.
    pub node_block: usize,
    /// Units added to the tail buffer per growth step.
    pub tail_block: usize,
}

impl TreeConfig {
    /// Config with the same block size for nodes and tails.
    pub fn with_block_size(block: usize) -> Self {
        Self {
            node_block: block,
            tail_block: block,
        }
    }

    #[inline]
    pub(crate) fn node_step(&self) -> usize {
        self.node_block.max(1)
    }

    #[inline]
    pub(crate) fn tail_step(&self) -> usize {
        self.tail_block.max(1)
    }
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }
}
