//! Fixed-capacity sample history
//!
//! `History<N>` keeps the N most recent values of a signal, newest at
//! offset 0 and oldest at offset N-1. Every filter stage, the peak
//! detector's delay line and the averager's group-delay ring are built on it.
//! Pushing moves a write cursor instead of shifting the array.

/// Circular history of the last `N` samples
#[derive(Debug, Clone, Copy)]
pub struct History<const N: usize> {
    values: [f32; N],
    /// Slot of the newest value
    head: usize,
}

impl<const N: usize> History<N> {
    const NON_EMPTY: () = assert!(N > 0, "History capacity must be at least 1");

    /// Create a history filled with zeros
    pub const fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::NON_EMPTY;
        Self {
            values: [0.0; N],
            head: 0,
        }
    }

    /// Number of values held (always N)
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Insert a new value at offset 0 and return the value that fell off the end.
    #[inline]
    pub fn push(&mut self, value: f32) -> f32 {
        // The slot just before the head holds the oldest value.
        self.head = if self.head == 0 { N - 1 } else { self.head - 1 };
        let evicted = self.values[self.head];
        self.values[self.head] = value;
        evicted
    }

    /// Value `offset` pushes ago (0 = newest), or `None` past the capacity.
    #[inline]
    pub fn get(&self, offset: usize) -> Option<f32> {
        if offset < N {
            Some(self.values[(self.head + offset) % N])
        } else {
            None
        }
    }

    #[inline]
    pub fn newest(&self) -> f32 {
        self.values[self.head]
    }

    #[inline]
    pub fn oldest(&self) -> f32 {
        self.values[(self.head + N - 1) % N]
    }

    /// Iterate from newest to oldest
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        (0..N).map(move |offset| self.values[(self.head + offset) % N])
    }

    /// Weighted sum `Σ weights[i] * x[i]` with `x[0]` the newest value
    #[inline]
    pub fn dot(&self, weights: &[f32; N]) -> f32 {
        weights
            .iter()
            .zip(self.iter())
            .map(|(w, x)| w * x)
            .sum()
    }

    pub fn sum(&self) -> f32 {
        self.values.iter().sum()
    }

    /// Copy out newest-first
    pub fn to_array(&self) -> [f32; N] {
        let mut out = [0.0; N];
        for (slot, value) in out.iter_mut().zip(self.iter()) {
            *slot = value;
        }
        out
    }

    pub fn fill(&mut self, value: f32) {
        self.values = [value; N];
    }

    /// Clear back to all zeros
    pub fn reset(&mut self) {
        self.values = [0.0; N];
        self.head = 0;
    }
}

impl<const N: usize> Default for History<N> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_shifts_by_one() {
        let mut history: History<4> = History::new();
        for value in 1..=6 {
            let before = history.to_array();
            history.push(value as f32);
            let after = history.to_array();

            assert_eq!(after[0], value as f32);
            // Every older value moved exactly one slot towards the end
            assert_eq!(&after[1..], &before[..3]);
        }
        assert_eq!(history.to_array(), [6.0, 5.0, 4.0, 3.0]);
    }

    #[test]
    fn test_push_returns_evicted() {
        let mut history: History<3> = History::new();
        assert_eq!(history.push(1.0), 0.0);
        assert_eq!(history.push(2.0), 0.0);
        assert_eq!(history.push(3.0), 0.0);
        assert_eq!(history.push(4.0), 1.0);
        assert_eq!(history.oldest(), 2.0);
        assert_eq!(history.newest(), 4.0);
    }

    #[test]
    fn test_get_bounds() {
        let mut history: History<2> = History::new();
        history.push(7.0);
        assert_eq!(history.get(0), Some(7.0));
        assert_eq!(history.get(1), Some(0.0));
        assert_eq!(history.get(2), None);
    }

    #[test]
    fn test_dot_weights_newest_first() {
        let mut history: History<3> = History::new();
        history.push(1.0);
        history.push(2.0);
        history.push(3.0);
        // newest (3) weighted by 1, oldest (1) weighted by 100
        assert_eq!(history.dot(&[1.0, 10.0, 100.0]), 3.0 + 20.0 + 100.0);
        assert_eq!(history.sum(), 6.0);
    }

    #[test]
    fn test_single_slot_history() {
        let mut history: History<1> = History::new();
        history.push(5.0);
        assert_eq!(history.newest(), 5.0);
        assert_eq!(history.oldest(), 5.0);
        assert_eq!(history.push(6.0), 5.0);
    }

    #[test]
    fn test_reset_and_fill() {
        let mut history: History<3> = History::new();
        history.fill(2.0);
        assert_eq!(history.sum(), 6.0);
        history.reset();
        assert!(history.iter().all(|v| v == 0.0));
    }
}
