//! Lazy enumeration of every subset of a family's children.
//!
//! Subsets are produced in reflected Gray-code order: the first is the empty set
//! and each following subset differs from the previous one by exactly one child.
//! The iterator holds only the child ages and a step counter, so enumerating the
//! 2^N subsets of an N-child family costs O(2^N) time and O(N) memory.

use crate::types::AgeSet;

/// Gray-code iterator over all subsets of a set of child ages.
#[derive(Clone, Debug)]
pub struct Subsets {
    ages: [u32; 64],
    len: usize,
    current: AgeSet,
    step: u64,
}

impl Subsets {
    /// Subsets of an ordered list of distinct child ages.
    pub fn new(ages: &[u32]) -> Self {
        assert!(ages.len() < 64, "cannot enumerate subsets of {} ages", ages.len());
        let mut buf = [0u32; 64];
        buf[..ages.len()].copy_from_slice(ages);
        Self {
            ages: buf,
            len: ages.len(),
            current: AgeSet::EMPTY,
            step: 0,
        }
    }

    /// Subsets of the children in a family composition.
    pub fn of(family: AgeSet) -> Self {
        let mut buf = [0u32; 64];
        let mut len = 0;
        for age in family.ages() {
            buf[len] = age;
            len += 1;
        }
        Self::new(&buf[..len])
    }

    /// Number of subsets in a full pass: 2^N.
    #[inline(always)]
    pub fn total(&self) -> u64 {
        1u64 << self.len
    }

    /// Start again from the empty set.
    pub fn restart(&mut self) {
        self.current = AgeSet::EMPTY;
        self.step = 0;
    }
}

impl Iterator for Subsets {
    type Item = AgeSet;

    #[inline]
    fn next(&mut self) -> Option<AgeSet> {
        if self.step >= self.total() {
            return None;
        }
        if self.step > 0 {
            // Gray code: step i flips the member at the lowest set bit of i.
            let flip = self.step.trailing_zeros() as usize;
            self.current.toggle(self.ages[flip]);
        }
        self.step += 1;
        Some(self.current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total() - self.step) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Subsets {}
