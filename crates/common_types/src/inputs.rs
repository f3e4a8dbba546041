//! Filters accepted by store queries.

use std::ops::{Bound, RangeBounds};

use crate::BlockNumber;

/// A block range, specified by optional start and end block numbers.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockRange {
    /// The start block number (inclusive).
    pub start: Option<BlockNumber>,
    /// The end block number (inclusive).
    pub end: Option<BlockNumber>,
}

impl BlockRange {
    pub fn new(start: BlockNumber, end: BlockNumber) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn single(number: BlockNumber) -> Self {
        Self::new(number, number)
    }

    /// Every block, regardless of its number.
    pub fn all() -> Self {
        Self::default()
    }

    /// Inclusive bounds with unbounded ends filled in.
    pub fn bounds(&self) -> (BlockNumber, BlockNumber) {
        (
            self.start.unwrap_or(BlockNumber::MIN),
            self.end.unwrap_or(BlockNumber::MAX),
        )
    }
}

impl RangeBounds<BlockNumber> for BlockRange {
    fn start_bound(&self) -> Bound<&BlockNumber> {
        match self.start {
            Some(ref start) => Bound::Included(start),
            None => Bound::Unbounded,
        }
    }

    fn end_bound(&self) -> Bound<&BlockNumber> {
        match self.end {
            Some(ref end) => Bound::Included(end),
            None => Bound::Unbounded,
        }
    }
}
