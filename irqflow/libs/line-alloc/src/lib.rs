// SPDX-License-Identifier: MPL-2.0

//! A bitmap allocator for interrupt line numbers.
//!
//! Legacy interrupt lines are wired to fixed numbers, while message-signaled
//! interrupts (MSI) need line numbers handed out at runtime. [`LineAlloc`]
//! manages the latter: it owns a contiguous range of line numbers and hands
//! them out lowest-first.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

use core::{fmt::Debug, ops::Range};

use bitvec::prelude::BitVec;

/// An allocator of line numbers within a fixed range.
///
/// The allocator never hands out a number outside of the range it is
/// created with, so the numbers below the range can be reserved for
/// statically wired lines.
#[derive(Clone)]
pub struct LineAlloc {
    base: usize,
    bitset: BitVec,
    first_available: usize,
    nr_allocated: usize,
}

impl LineAlloc {
    /// Constructs a new allocator managing the line numbers in `range`.
    ///
    /// An empty range yields an allocator that always fails.
    pub fn with_range(range: Range<usize>) -> Self {
        let capacity = range.end.saturating_sub(range.start);
        let mut bitset = BitVec::with_capacity(capacity);
        bitset.resize(capacity, false);
        Self {
            base: range.start,
            bitset,
            first_available: 0,
            nr_allocated: 0,
        }
    }

    fn range(&self) -> Range<usize> {
        self.base..self.base + self.bitset.len()
    }

    /// Allocates the lowest free line number.
    ///
    /// Returns `None` if every line in the range is in use.
    pub fn alloc(&mut self) -> Option<usize> {
        if self.nr_allocated == self.bitset.len() {
            return None;
        }
        let offset = self.bitset[self.first_available..].first_zero()? + self.first_available;
        self.bitset.set(offset, true);
        self.nr_allocated += 1;
        self.first_available = self.bitset[offset..]
            .first_zero()
            .map_or(self.bitset.len(), |next| next + offset);
        Some(self.base + offset)
    }

    /// Releases a line number so that it can be allocated again.
    ///
    /// # Panics
    ///
    /// Panics if the number is outside the range or was not allocated.
    pub fn free(&mut self, line: usize) {
        let offset = self
            .offset_of(line)
            .unwrap_or_else(|| panic!("line {} is not managed by this allocator", line));
        assert!(self.bitset[offset], "line {} has been freed", line);
        self.bitset.set(offset, false);
        self.nr_allocated -= 1;
        if offset < self.first_available {
            self.first_available = offset;
        }
    }

    /// Returns whether the line number is currently allocated.
    pub fn is_allocated(&self, line: usize) -> bool {
        self.offset_of(line)
            .is_some_and(|offset| self.bitset[offset])
    }

    fn offset_of(&self, line: usize) -> Option<usize> {
        let offset = line.checked_sub(self.base)?;
        (offset < self.bitset.len()).then_some(offset)
    }
}

impl Debug for LineAlloc {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("LineAlloc")
            .field("range", &self.range())
            .field("nr_allocated", &self.nr_allocated)
            .field("first_available", &(self.base + self.first_available))
            .finish()
    }
}
