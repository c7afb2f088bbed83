//! Row geometry: motion targets, references and burst construction.
//!
//! The positive pass travels from `start` to `end` and fires from
//! `reference_positive` upwards; the negative pass travels back and fires
//! from `reference_negative` downwards.

use barcode_common::hal::pulse::FifoEntry;
use barcode_common::state::Direction;

use crate::config::GeometryConfig;
use crate::pattern::PulseSegment;

/// Absolute setpoint handed to the motion requester.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionTarget {
    pub position: f64,
}

/// Validated row positions and pulse spacing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowGeometry {
    start: f64,
    end: f64,
    reference_positive: f64,
    reference_negative: f64,
    delta_position: f64,
    pulse_width: f64,
}

impl RowGeometry {
    pub fn from_config(config: &GeometryConfig) -> Self {
        Self {
            start: config.start_position,
            end: config.end_position,
            reference_positive: config.reference_positive,
            reference_negative: config.reference_negative,
            delta_position: config.delta_position,
            pulse_width: config.pulse_width,
        }
    }

    /// Parking position every run starts from.
    #[inline]
    pub fn row_start(&self) -> MotionTarget {
        MotionTarget {
            position: self.start,
        }
    }

    /// Travel target of a pass in `direction`.
    #[inline]
    pub fn row_end_target(&self, direction: Direction) -> MotionTarget {
        MotionTarget {
            position: self.row_end(direction),
        }
    }

    #[inline]
    pub fn row_end(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Positive => self.end,
            Direction::Negative => self.start,
        }
    }

    /// First pulse position of a pass in `direction`.
    #[inline]
    pub fn reference(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Positive => self.reference_positive,
            Direction::Negative => self.reference_negative,
        }
    }

    #[inline]
    pub fn delta_position(&self) -> f64 {
        self.delta_position
    }

    #[inline]
    pub fn signed_delta(&self, direction: Direction) -> f64 {
        direction.sign() * self.delta_position
    }

    /// FIFO descriptor for one segment. Suppressed segments keep their count
    /// so the position still advances, but carry zero width.
    pub fn burst(&self, direction: Direction, segment: PulseSegment) -> FifoEntry {
        FifoEntry {
            delta: self.signed_delta(direction),
            pulse_width: if segment.enabled { self.pulse_width } else { 0.0 },
            count: segment.count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geometry() -> RowGeometry {
        RowGeometry::from_config(&GeometryConfig::default())
    }

    #[test]
    fn targets_alternate_between_row_ends() {
        let g = geometry();
        assert_eq!(g.row_start().position, 19.9);
        assert_eq!(g.row_end_target(Direction::Negative), g.row_start());
        assert!((g.row_end_target(Direction::Positive).position - 23.0).abs() < 1e-9);
    }

    #[test]
    fn burst_sign_follows_direction() {
        let g = geometry();
        let seg = PulseSegment::new(8, true);
        let pos = g.burst(Direction::Positive, seg);
        let neg = g.burst(Direction::Negative, seg);
        assert!(pos.delta > 0.0);
        assert_eq!(neg.delta, -pos.delta);
        assert_eq!(pos.count, 8);
        assert_eq!(pos.pulse_width, 0.00001);
    }

    #[test]
    fn suppressed_segment_has_zero_width() {
        let entry = geometry().burst(Direction::Positive, PulseSegment::new(5, false));
        assert_eq!(entry.pulse_width, 0.0);
        assert_eq!(entry.count, 5);
    }
}
