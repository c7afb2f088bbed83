//! Motion requester interface (path planner boundary).

/// Issues absolute moves to the external axis-motion subsystem.
///
/// # Contract
///
/// | Operation | Blocking | Effect |
/// |-----------|----------|--------|
/// | `move_absolute()` | no | one-shot absolute move command |
/// | `stop()` | no | cancel the active move, hold current position |
/// | `is_done()` | no | poll for completion of the most recent move |
///
/// A move that never completes leaves `is_done()` false forever. The
/// requester itself has no failure channel; callers detect stalls by
/// counting cycles.
pub trait MotionRequester {
    /// Command a move to `position` [user units]. Returns immediately.
    fn move_absolute(&mut self, position: f64);

    /// Abort the active move.
    fn stop(&mut self);

    /// True exactly when the most recently issued move reached its target
    /// and the axis is settled.
    fn is_done(&self) -> bool;
}

impl<T: MotionRequester + ?Sized> MotionRequester for &mut T {
    fn move_absolute(&mut self, position: f64) {
        (**self).move_absolute(position);
    }

    fn stop(&mut self) {
        (**self).stop();
    }

    fn is_done(&self) -> bool {
        (**self).is_done()
    }
}
