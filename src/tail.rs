//! Append-only storage for compressed key suffixes.
//!
//! Each suffix is stored followed by a [`TERMINATOR`] unit and addressed by
//! the offset of its first unit. After compaction several compressed nodes
//! may point at the same offset.

use tracing::{trace, warn};

use crate::error::{Result, TreeError};
use crate::TERMINATOR;

/// Offsets are `u16`, so the buffer never grows past this many units.
pub(crate) const MAX_TAIL_UNITS: usize = u16::MAX as usize + 1;

#[derive(Clone)]
pub(crate) struct TailBuffer {
    units: Vec<u16>,
    block: usize,
}

impl TailBuffer {
    pub(crate) fn new(block: usize) -> Self {
        Self {
            units: Vec::new(),
            block: block.max(1),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.units.len()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.units.capacity()
    }

    pub(crate) fn memory_usage(&self) -> usize {
        self.units.capacity() * std::mem::size_of::<u16>()
    }

    /// Reserve `len + 1` units (the extra one holds the terminator) and
    /// return the offset of the first.
    pub(crate) fn alloc(&mut self, len: usize) -> Result<u16> {
        let start = self.units.len();
        let end = start + len + 1;
        if end > MAX_TAIL_UNITS {
            warn!(used = start, requested = len + 1, "tail buffer exhausted");
            return Err(TreeError::TailCapacity {
                requested: end,
                limit: MAX_TAIL_UNITS,
            });
        }
        let cap = self.units.capacity();
        if end > cap {
            let blocks = (end - cap).div_ceil(self.block);
            let target = (cap + blocks * self.block).min(MAX_TAIL_UNITS);
            self.units.try_reserve_exact(target - start)?;
            trace!(from = cap, to = self.units.capacity(), "tail buffer grown");
        }
        self.units.resize(end, TERMINATOR);
        Ok(start as u16)
    }

    /// Copy `suffix` into a fresh region and return its offset.
    pub(crate) fn store(&mut self, suffix: &[u16]) -> Result<u16> {
        let off = self.alloc(suffix.len())?;
        let start = off as usize;
        self.units[start..start + suffix.len()].copy_from_slice(suffix);
        Ok(off)
    }

    #[inline]
    pub(crate) fn get(&self, off: u16) -> u16 {
        self.units[off as usize]
    }

    /// The suffix starting at `off`, without its terminator.
    pub(crate) fn tail(&self, off: u16) -> &[u16] {
        let rest = &self.units[off as usize..];
        let end = rest
            .iter()
            .position(|&u| u == TERMINATOR)
            .unwrap_or(rest.len());
        &rest[..end]
    }

    /// Exact match of the whole stored suffix against `key`, lengths included.
    #[inline]
    pub(crate) fn matches(&self, off: u16, key: &[u16]) -> bool {
        self.tail(off) == key
    }

    /// Drop everything stored at or after `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.units.truncate(len);
    }

    /// Release capacity past the used length.
    pub(crate) fn trim_to_exact(&mut self) {
        self.units.shrink_to_fit();
    }
}
