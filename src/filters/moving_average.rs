use super::SlidingWindow;
use serde::Serialize;

/// Pixel-space estimate of the face centre
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TrackedPosition {
    pub x: f64,
    pub y: f64,
}

impl TrackedPosition {
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Moving average over recent face centres
///
/// Frames without a face do not feed the smoother; the caller reuses
/// [`PositionSmoother::last_output`] instead so the rig does not snap back
/// to the frame centre when detection drops out for a moment.
#[derive(Debug, Clone)]
pub struct PositionSmoother {
    x_buffer: SlidingWindow<f64>,
    y_buffer: SlidingWindow<f64>,
    last_output: Option<TrackedPosition>,
}

impl PositionSmoother {
    #[must_use]
    pub fn new(window_size: usize) -> Self {
        Self {
            x_buffer: SlidingWindow::new(window_size),
            y_buffer: SlidingWindow::new(window_size),
            last_output: None,
        }
    }

    /// Add a raw face centre and return the smoothed position
    pub fn push(&mut self, sample: TrackedPosition) -> TrackedPosition {
        self.x_buffer.push(sample.x);
        self.y_buffer.push(sample.y);

        let smoothed = TrackedPosition::new(
            self.x_buffer.mean_or(sample.x),
            self.y_buffer.mean_or(sample.y),
        );
        self.last_output = Some(smoothed);
        smoothed
    }

    /// Last smoothed position, `None` before the first face
    #[must_use]
    pub const fn last_output(&self) -> Option<TrackedPosition> {
        self.last_output
    }

    /// Last smoothed position, or `fallback` before the first face
    #[must_use]
    pub fn hold_or(&self, fallback: TrackedPosition) -> TrackedPosition {
        self.last_output.unwrap_or(fallback)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.x_buffer.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.x_buffer.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_moving_average() {
        let mut smoother = PositionSmoother::new(3);

        let p1 = smoother.push(TrackedPosition::new(10.0, 20.0));
        assert_eq!(p1, TrackedPosition::new(10.0, 20.0));

        let p2 = smoother.push(TrackedPosition::new(20.0, 30.0));
        assert_eq!(p2, TrackedPosition::new(15.0, 25.0));

        let p3 = smoother.push(TrackedPosition::new(30.0, 40.0));
        assert_eq!(p3, TrackedPosition::new(20.0, 30.0));

        // Window is full, oldest value should be dropped
        let p4 = smoother.push(TrackedPosition::new(40.0, 50.0));
        assert_eq!(p4, TrackedPosition::new(30.0, 40.0));
        assert_eq!(smoother.len(), 3);
    }

    #[test]
    fn test_hold_last_output() {
        let centre = TrackedPosition::new(320.0, 240.0);
        let mut smoother = PositionSmoother::new(5);
        assert!(smoother.is_empty());
        assert_eq!(smoother.hold_or(centre), centre);

        smoother.push(TrackedPosition::new(100.0, 100.0));
        smoother.push(TrackedPosition::new(200.0, 100.0));
        assert_eq!(smoother.hold_or(centre), TrackedPosition::new(150.0, 100.0));
        assert_eq!(smoother.last_output(), Some(TrackedPosition::new(150.0, 100.0)));
    }
}
