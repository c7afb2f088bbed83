//! Segment pattern table.
//!
//! One ordered burst sequence per travel direction, loaded once from
//! configuration and read-only afterwards. Storage is fixed-capacity so the
//! table can live inside the RT task without heap access.

use barcode_common::consts::MAX_SEGMENTS;
use barcode_common::state::Direction;
use heapless::Vec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One burst of `count` pulses. Disabled segments still advance position
/// but are emitted with zero pulse width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PulseSegment {
    pub count: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl PulseSegment {
    pub const fn new(count: u32, enabled: bool) -> Self {
        Self { count, enabled }
    }
}

/// Pattern construction and lookup errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("{direction} pattern has no segments")]
    Empty { direction: Direction },

    #[error("{direction} pattern has {count} segments, at most {max} supported")]
    TooManySegments {
        direction: Direction,
        count: usize,
        max: usize,
    },

    #[error("{direction} segment index {index} out of range (count {count})")]
    IndexOutOfRange {
        direction: Direction,
        index: usize,
        count: usize,
    },
}

/// Ordered burst sequence for one direction.
pub type RowPattern = Vec<PulseSegment, MAX_SEGMENTS>;

/// Positive and negative row patterns.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentTable {
    positive: RowPattern,
    negative: RowPattern,
}

impl SegmentTable {
    /// Build a table, failing fast on empty or oversized patterns.
    pub fn new(positive: &[PulseSegment], negative: &[PulseSegment]) -> Result<Self, PatternError> {
        Ok(Self {
            positive: Self::build(Direction::Positive, positive)?,
            negative: Self::build(Direction::Negative, negative)?,
        })
    }

    fn build(direction: Direction, segments: &[PulseSegment]) -> Result<RowPattern, PatternError> {
        if segments.is_empty() {
            return Err(PatternError::Empty { direction });
        }
        RowPattern::from_slice(segments).map_err(|_| PatternError::TooManySegments {
            direction,
            count: segments.len(),
            max: MAX_SEGMENTS,
        })
    }

    #[inline]
    pub fn pattern(&self, direction: Direction) -> &[PulseSegment] {
        match direction {
            Direction::Positive => &self.positive,
            Direction::Negative => &self.negative,
        }
    }

    #[inline]
    pub fn segment_count(&self, direction: Direction) -> usize {
        self.pattern(direction).len()
    }

    pub fn segment_at(&self, direction: Direction, index: usize) -> Result<PulseSegment, PatternError> {
        let pattern = self.pattern(direction);
        pattern
            .get(index)
            .copied()
            .ok_or(PatternError::IndexOutOfRange {
                direction,
                index,
                count: pattern.len(),
            })
    }

    /// Pulses emitted over one pass, suppressed segments included.
    pub fn total_pulses(&self, direction: Direction) -> u64 {
        self.pattern(direction).iter().map(|s| s.count as u64).sum()
    }
}

impl Default for SegmentTable {
    /// The production barcode pattern: bars 8/8/5 wide separated by 5-pulse gaps.
    fn default() -> Self {
        let on = [true, false, true, false, true];
        let positive: RowPattern = [8, 5, 8, 5, 5]
            .into_iter()
            .zip(on)
            .map(|(count, enabled)| PulseSegment::new(count, enabled))
            .collect();
        let negative: RowPattern = [5, 5, 8, 5, 8]
            .into_iter()
            .zip(on)
            .map(|(count, enabled)| PulseSegment::new(count, enabled))
            .collect();
        Self { positive, negative }
    }
}
