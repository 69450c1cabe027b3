// Randomness sources and the elimination-count distribution.

use rand::Rng;

/// Source of the two kinds of draws the simulator needs.
///
/// Production code wraps a seeded `rand` generator in [`RngEntropy`]; tests
/// can script exact draw sequences to force specific outcomes.
pub trait Entropy {
    /// Uniform draw in `[0, 1)`.
    fn unit(&mut self) -> f64;

    /// Uniform index in `[0, len)`. `len` is always non-zero.
    fn index(&mut self, len: usize) -> usize;
}

/// Adapter from any `rand::Rng` to [`Entropy`].
#[derive(Debug, Clone)]
pub struct RngEntropy<R>(pub R);

impl<R: Rng> Entropy for RngEntropy<R> {
    fn unit(&mut self) -> f64 {
        self.0.gen::<f64>()
    }

    fn index(&mut self, len: usize) -> usize {
        self.0.gen_range(0..len)
    }
}

/// Upper bound of the elimination count for a roster of `len` (`ceil(len/3)`).
pub fn max_eliminations(len: usize) -> usize {
    len.div_ceil(3)
}

/// Number of eliminations scheduled for one round.
///
/// Rosters of three or fewer lose exactly one participant. Larger rosters
/// sample from `1..=ceil(len/3)` where 1 carries half of the mass and the
/// other half is split evenly across the remaining outcomes. `x` is the
/// uniform draw used for inverse-CDF sampling.
pub fn elimination_count(len: usize, x: f64) -> usize {
    if len <= 3 {
        return 1;
    }

    let max_killed = max_eliminations(len);
    let tail = 0.5 / (max_killed - 1) as f64;
    let mut cumulative = 0.0;

    for outcome in 1..=max_killed {
        cumulative += if outcome == 1 { 0.5 } else { tail };
        if x < cumulative {
            return outcome;
        }
    }

    // Float rounding can leave the final cumulative sum just below 1.0.
    max_killed
}
