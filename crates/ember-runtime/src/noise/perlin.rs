//! Perlin gradient noise (improved-noise variant)

use super::{fade, lerp, permutation_table, rng_for_seed};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

static DEFAULT: LazyLock<Arc<PerlinSampler>> = LazyLock::new(|| {
    let mut rng = StdRng::from_os_rng();
    Arc::new(PerlinSampler::from_rng(&mut rng))
});

static BY_SEED: LazyLock<Mutex<HashMap<i64, Arc<PerlinSampler>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// 1/2/3-D Perlin noise over a seeded gradient lattice. Output is in [-1, 1].
pub struct PerlinSampler {
    perm: [u8; 512],
}

impl PerlinSampler {
    pub(crate) fn from_rng(rng: &mut StdRng) -> Self {
        PerlinSampler {
            perm: permutation_table(rng),
        }
    }

    /// The process-default sampler (random lattice, fixed for this run)
    pub fn default_instance() -> Arc<PerlinSampler> {
        Arc::clone(&DEFAULT)
    }

    /// The cached sampler for `seed`
    pub fn seeded(seed: i64) -> Arc<PerlinSampler> {
        Arc::clone(
            BY_SEED
                .lock()
                .unwrap()
                .entry(seed)
                .or_insert_with(|| Arc::new(PerlinSampler::from_rng(&mut rng_for_seed(seed)))),
        )
    }

    pub fn sample1d(&self, x: f64) -> f64 {
        self.sample3d(x, 0.0, 0.0)
    }

    pub fn sample2d(&self, x: f64, y: f64) -> f64 {
        self.sample3d(x, y, 0.0)
    }

    pub fn sample3d(&self, x: f64, y: f64, z: f64) -> f64 {
        let xi = (x.floor() as i64 & 255) as usize;
        let yi = (y.floor() as i64 & 255) as usize;
        let zi = (z.floor() as i64 & 255) as usize;
        let xf = x - x.floor();
        let yf = y - y.floor();
        let zf = z - z.floor();

        let u = fade(xf);
        let v = fade(yf);
        let w = fade(zf);

        let p = &self.perm;
        let a = p[xi] as usize + yi;
        let aa = p[a] as usize + zi;
        let ab = p[a + 1] as usize + zi;
        let b = p[xi + 1] as usize + yi;
        let ba = p[b] as usize + zi;
        let bb = p[b + 1] as usize + zi;

        lerp(
            w,
            lerp(
                v,
                lerp(
                    u,
                    grad(p[aa], xf, yf, zf),
                    grad(p[ba], xf - 1.0, yf, zf),
                ),
                lerp(
                    u,
                    grad(p[ab], xf, yf - 1.0, zf),
                    grad(p[bb], xf - 1.0, yf - 1.0, zf),
                ),
            ),
            lerp(
                v,
                lerp(
                    u,
                    grad(p[aa + 1], xf, yf, zf - 1.0),
                    grad(p[ba + 1], xf - 1.0, yf, zf - 1.0),
                ),
                lerp(
                    u,
                    grad(p[ab + 1], xf, yf - 1.0, zf - 1.0),
                    grad(p[bb + 1], xf - 1.0, yf - 1.0, zf - 1.0),
                ),
            ),
        )
    }
}

fn grad(hash: u8, x: f64, y: f64, z: f64) -> f64 {
    match hash & 15 {
        0 => x + y,
        1 => -x + y,
        2 => x - y,
        3 => -x - y,
        4 => x + z,
        5 => -x + z,
        6 => x - z,
        7 => -x - z,
        8 => y + z,
        9 => -y + z,
        10 => y - z,
        11 => -y - z,
        12 => y + x,
        13 => -y + z,
        14 => y - x,
        _ => -y - z,
    }
}
