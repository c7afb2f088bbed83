//! Cycle-counted wait deadlines.
//!
//! The sequencer never blocks, so "waiting too long" is measured in ticks
//! spent in the same wait. A deadline without a limit never expires.

/// Counts consecutive cycles of one wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleDeadline {
    limit: Option<u32>,
    waited: u32,
}

impl CycleDeadline {
    pub const fn new(limit: Option<u32>) -> Self {
        Self { limit, waited: 0 }
    }

    /// Start a new wait.
    #[inline]
    pub fn restart(&mut self) {
        self.waited = 0;
    }

    /// Count one more cycle of waiting. Returns `true` once the limit is reached.
    #[inline]
    pub fn tick(&mut self) -> bool {
        self.waited = self.waited.saturating_add(1);
        matches!(self.limit, Some(limit) if self.waited >= limit)
    }

    #[inline]
    pub fn waited(&self) -> u32 {
        self.waited
    }
}
