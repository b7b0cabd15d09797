//! Smoothing filters for noisy per-frame measurements.
//!
//! Both the face-centre position used for aiming and the gaze ratio used
//! for scoring are averaged over a short window so that a single bad
//! detection cannot move the servos or flip the focus status.

/// Bounded FIFO history with eviction of the oldest sample
pub mod sliding_window;

/// Moving average over face-centre positions
pub mod moving_average;

pub use moving_average::{PositionSmoother, TrackedPosition};
pub use sliding_window::SlidingWindow;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reexports() {
        let mut window = SlidingWindow::new(2);
        window.push(1.0);
        assert_eq!(window.mean(), Some(1.0));

        let mut smoother = PositionSmoother::new(2);
        let out = smoother.push(TrackedPosition::new(4.0, 6.0));
        assert_eq!(out, TrackedPosition::new(4.0, 6.0));
    }
}
