//! Coherent noise samplers
//!
//! Deterministic gradient-noise generators keyed by seed. Each sampler kind
//! has a process-default instance (seeded from entropy once per run) and a
//! per-seed cache, so `perlin(x, y, z, seed)` calls with the same seed share
//! one sampler.

mod perlin;
mod simplex;

pub use perlin::PerlinSampler;
pub use simplex::SimplexSampler;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// A doubled 256-entry permutation table. The second half mirrors the first
/// so gradient lookups never need to wrap explicitly.
pub(crate) fn permutation_table(rng: &mut StdRng) -> [u8; 512] {
    let mut base: [u8; 256] = std::array::from_fn(|i| i as u8);
    base.shuffle(rng);
    std::array::from_fn(|i| base[i & 255])
}

pub(crate) fn rng_for_seed(seed: i64) -> StdRng {
    StdRng::seed_from_u64(seed as u64)
}

pub(crate) fn fade(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

pub(crate) fn lerp(t: f64, a: f64, b: f64) -> f64 {
    a + t * (b - a)
}
