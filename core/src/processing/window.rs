use std::collections::VecDeque;

/// Fixed-capacity FIFO of raw fire signals used to debounce the decision.
#[derive(Debug, Clone)]
pub struct FusionWindow {
    signals: VecDeque<bool>,
    capacity: usize,
    confirmations: usize,
}

impl FusionWindow {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            signals: VecDeque::with_capacity(capacity),
            capacity,
            confirmations: 0,
        }
    }

    /// Appends a signal, evicting the oldest one once the window is full.
    pub fn push(&mut self, raw_signal: bool) {
        if self.signals.len() == self.capacity {
            if let Some(true) = self.signals.pop_front() {
                self.confirmations -= 1;
            }
        }
        self.signals.push_back(raw_signal);
        if raw_signal {
            self.confirmations += 1;
        }
    }

    /// Number of `true` signals currently held.
    pub fn confirmations(&self) -> usize {
        self.confirmations
    }

    pub fn fill(&self) -> usize {
        self.signals.len()
    }

    #[cfg(test)]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[cfg(test)]
    pub(crate) fn is_full(&self) -> bool {
        self.signals.len() == self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window_from(signals: &[bool], k: usize) -> FusionWindow {
        let mut window = FusionWindow::with_capacity(k);
        for &s in signals {
            window.push(s);
        }
        window
    }

    #[test]
    fn length_never_exceeds_capacity() {
        let mut window = FusionWindow::with_capacity(5);
        for i in 0..12 {
            window.push(i % 3 == 0);
            assert!(window.fill() <= 5);
            if i >= 4 {
                assert_eq!(window.fill(), 5);
                assert!(window.is_full());
            }
        }
    }

    #[test]
    fn three_of_five_confirms() {
        let window = window_from(&[true, true, true, false, false], 5);
        assert_eq!(window.confirmations(), 3);
        assert!(window.confirmations() >= 3);
    }

    #[test]
    fn two_of_five_does_not_confirm() {
        let window = window_from(&[true, true, false, false, false], 5);
        assert_eq!(window.confirmations(), 2);
        assert!(window.confirmations() < 3);
    }

    #[test]
    fn eviction_drops_oldest_confirmation() {
        let mut window = window_from(&[true, false, false], 3);
        assert_eq!(window.confirmations(), 1);
        window.push(false);
        assert_eq!(window.confirmations(), 0);
        assert_eq!(window.fill(), 3);
    }

    #[test]
    fn confirmations_match_window_contents_at_extremes() {
        assert_eq!(window_from(&[false; 8], 5).confirmations(), 0);
        assert_eq!(window_from(&[true; 8], 5).confirmations(), 5);
        assert_eq!(window_from(&[], 5).fill(), 0);
    }

    #[test]
    fn zero_capacity_is_clamped_to_one() {
        let window = window_from(&[true, false], 0);
        assert_eq!(window.capacity(), 1);
        assert_eq!(window.confirmations(), 0);
    }
}
