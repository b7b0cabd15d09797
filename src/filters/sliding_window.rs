use std::collections::VecDeque;

/// Last `capacity` samples in arrival order
#[derive(Debug, Clone)]
pub struct SlidingWindow<T> {
    capacity: usize,
    samples: VecDeque<T>,
}

impl<T> SlidingWindow<T> {
    /// Create an empty window
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Window size must be greater than 0");
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a sample, evicting the oldest one when full
    pub fn push(&mut self, sample: T) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Most recently pushed sample
    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.samples.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

impl SlidingWindow<f64> {
    /// Arithmetic mean of the window, `None` when empty
    #[must_use]
    #[allow(clippy::cast_precision_loss)] // window sizes are tiny
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    /// Mean of the window or `fallback` when empty
    #[must_use]
    pub fn mean_or(&self, fallback: f64) -> f64 {
        self.mean().unwrap_or(fallback)
    }
}
