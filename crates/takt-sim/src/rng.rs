use serde::{Deserialize, Serialize};

/// Tiny deterministic RNG driving every workload decision.
///
/// A plain 64-bit LCG: portable, allocation-free, and reproducible
/// across platforms, which is all the harness needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    /// Create a new deterministic RNG from a seed.
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            state: seed ^ 0x9E37_79B9_7F4A_7C15,
        }
    }

    /// Next pseudo-random `u64`.
    #[must_use]
    pub fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        self.state
    }

    /// Next value in `[0, upper_exclusive)`.
    #[must_use]
    pub fn next_bounded(&mut self, upper_exclusive: u64) -> u64 {
        if upper_exclusive == 0 {
            return 0;
        }
        self.next_u64() % upper_exclusive
    }

    /// Next value in `[0, upper_exclusive)` as a `u32`.
    #[must_use]
    pub fn next_u32_below(&mut self, upper_exclusive: u32) -> u32 {
        u32::try_from(self.next_bounded(u64::from(upper_exclusive))).unwrap_or(0)
    }

    /// Next value in `[0, upper_exclusive)` as an `i64`.
    ///
    /// An upper bound of zero or below yields zero.
    #[must_use]
    pub fn next_i64_below(&mut self, upper_exclusive: i64) -> i64 {
        let bound = u64::try_from(upper_exclusive.max(0)).unwrap_or(0);
        i64::try_from(self.next_bounded(bound)).unwrap_or(0)
    }

    /// Bernoulli trial with integer percent.
    #[must_use]
    pub fn chance_percent(&mut self, percent: u8) -> bool {
        if percent == 0 {
            return false;
        }
        if percent >= 100 {
            return true;
        }
        self.next_bounded(100) < u64::from(percent)
    }

    /// Pick one element of `items`, or `None` when the slice is empty.
    pub fn pick<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let bound = u64::try_from(items.len()).unwrap_or(u64::MAX);
        let idx = usize::try_from(self.next_bounded(bound)).unwrap_or(0);
        items.get(idx)
    }
}
