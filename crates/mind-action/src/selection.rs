use mind_core::{Accumulate, Sampler};

/// Inhibition discounts tried in order, least to most permissive.
///
/// At factor `0` inhibition counts fully; at factor `1` it is ignored, so a
/// strongly excited but inhibited candidate still wins when nothing else is
/// viable.
pub const RELAXATION_FACTORS: [f32; 5] = [0.0, 0.25, 0.5, 0.75, 1.0];

/// Excitation and inhibition collected for one candidate in one tick window.
///
/// Multiple signals within a window keep the max, not the sum.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Signals {
    pub excite: f32,
    pub inhibit: f32,
}

impl Signals {
    pub fn new(excite: f32, inhibit: f32) -> Self {
        Self { excite, inhibit }
    }

    pub fn weight(&self, factor: f32) -> f32 {
        self.excite - (1.0 - factor) * self.inhibit
    }
}

impl Accumulate for Signals {
    fn accumulate(&mut self, other: Self) {
        self.excite = self.excite.max(other.excite);
        self.inhibit = self.inhibit.max(other.inhibit);
    }
}

/// Picks at most one candidate, relaxing inhibition step by step.
///
/// Returns the index of the winner, or `None` when no candidate has a positive
/// weight even with inhibition ignored.
pub fn select_action(candidates: &[Signals], sampler: &Sampler) -> Option<usize> {
    RELAXATION_FACTORS
        .iter()
        .find_map(|&factor| select_factor(candidates, factor, sampler))
}

/// One relaxation step: every candidate with a positive weight draws a bid in
/// `[0, weight]` and the highest bid wins. Equal bids go to the later candidate.
pub fn select_factor(candidates: &[Signals], factor: f32, sampler: &Sampler) -> Option<usize> {
    let mut best = None;
    let mut best_bid = 0.0f32;

    for (i, signals) in candidates.iter().enumerate() {
        let weight = signals.weight(factor);
        if weight <= 0.0 {
            continue;
        }

        let bid = sampler.sample(weight);
        if best_bid <= bid {
            best = Some(i);
            best_bid = bid;
        }
    }

    best
}
