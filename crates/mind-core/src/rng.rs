//! Deterministic RNG helpers.
//!
//! Small and dependency-free. It is **not** cryptographic. The [`Sampler`] built on top
//! is the only entropy source in a mind; everything else is a pure function of the
//! external event sequence.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

pub trait DeterministicRng {
    fn next_u64(&mut self) -> u64;

    fn next_u32(&mut self) -> u32 {
        self.next_u64() as u32
    }

    fn next_f32_unit(&mut self) -> f32 {
        // 24 bits of mantissa -> [0, 1)
        let x = self.next_u32() >> 8;
        (x as f32) / ((1u32 << 24) as f32)
    }
}

/// SplitMix64: good seeding RNG and small deterministic generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitMix64 {
    state: u64,
}

impl SplitMix64 {
    pub fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    fn step(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E3779B97F4A7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
        z ^ (z >> 31)
    }
}

impl DeterministicRng for SplitMix64 {
    fn next_u64(&mut self) -> u64 {
        self.step()
    }
}

/// How [`Sampler::sample`] draws from `[0, weight]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleMode {
    /// Uniform over `[0, weight]`.
    #[default]
    Uniform,
    /// Uniform over `[max(0, weight - 1e-3), weight]`: the highest weight
    /// practically always wins.
    Max,
}

const MAX_MODE_WINDOW: f32 = 1e-3;

/// Shared handle to the mind's single random source.
#[derive(Clone)]
pub struct Sampler {
    rng: Rc<RefCell<Box<dyn DeterministicRng>>>,
    mode: Rc<Cell<SampleMode>>,
}

impl Sampler {
    pub fn new(rng: Box<dyn DeterministicRng>, mode: SampleMode) -> Self {
        Self {
            rng: Rc::new(RefCell::new(rng)),
            mode: Rc::new(Cell::new(mode)),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(Box::new(SplitMix64::new(seed)), SampleMode::Uniform)
    }

    pub fn mode(&self) -> SampleMode {
        self.mode.get()
    }

    /// Swaps the generator behind every clone of this handle.
    pub(crate) fn replace_rng(&self, rng: Box<dyn DeterministicRng>) {
        *self.rng.borrow_mut() = rng;
    }

    pub(crate) fn set_mode(&self, mode: SampleMode) {
        self.mode.set(mode);
    }

    /// Draws a bid in `[0, weight]` (or the narrow top window in [`SampleMode::Max`]).
    pub fn sample(&self, weight: f32) -> f32 {
        let unit = self.rng.borrow_mut().next_f32_unit();
        let low = match self.mode.get() {
            SampleMode::Uniform => 0.0,
            SampleMode::Max => (weight - MAX_MODE_WINDOW).max(0.0),
        };
        low + (weight - low) * unit
    }
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sampler").field("mode", &self.mode.get()).finish()
    }
}
