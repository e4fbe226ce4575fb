//! One-tick input buffering.
//!
//! A node never reacts to a signal in the tick it arrives. Writes are stamped
//! with the clock value current at the write; a reader at tick `n` only sees
//! writes stamped before `n`. Signals sent between two ticks are therefore
//! visible at the next tick, and signals sent while tick `n` is running are
//! visible at tick `n + 1`, regardless of ticker order.

use std::mem;

/// Merge rule for values written into the same [`Latch`] window.
pub trait Accumulate: Default {
    fn accumulate(&mut self, other: Self);
}

impl Accumulate for bool {
    fn accumulate(&mut self, other: Self) {
        *self |= other;
    }
}

impl<T> Accumulate for Vec<T> {
    fn accumulate(&mut self, other: Self) {
        self.extend(other);
    }
}

#[derive(Debug, Default)]
pub struct Latch<T> {
    ready: T,
    fresh: T,
    stamp: u64,
}

impl<T: Accumulate> Latch<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Writes into the window of tick `now`.
    pub fn update(&mut self, now: u64, write: impl FnOnce(&mut T)) {
        self.promote(now);
        write(&mut self.fresh);
    }

    /// Consumes everything written before tick `now`.
    pub fn take(&mut self, now: u64) -> T {
        self.promote(now);
        mem::take(&mut self.ready)
    }

    /// Everything written so far, including the open window. Does not promote.
    pub fn peek(&self) -> T
    where
        T: Clone,
    {
        let mut all = self.ready.clone();
        all.accumulate(self.fresh.clone());
        all
    }

    fn promote(&mut self, now: u64) {
        if self.stamp < now {
            let fresh = mem::take(&mut self.fresh);
            self.ready.accumulate(fresh);
            self.stamp = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_sees_only_writes_stamped_before_the_tick() {
        let mut latch: Latch<Vec<u32>> = Latch::new();
        latch.update(0, |v| v.push(1));
        latch.update(1, |v| v.push(2));

        assert_eq!(latch.take(1), vec![1]);
        assert_eq!(latch.take(1), Vec::<u32>::new());
        assert_eq!(latch.take(2), vec![2]);
    }

    #[test]
    fn peek_includes_the_open_window_without_consuming() {
        let mut latch: Latch<bool> = Latch::new();
        latch.update(3, |b| *b = true);

        assert!(latch.peek());
        assert!(!latch.take(3));
        assert!(latch.take(4));
        assert!(!latch.peek());
    }
}
