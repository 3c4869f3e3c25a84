//! Simplex gradient noise (2-D and 3-D)

use super::{permutation_table, rng_for_seed};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock, Mutex};

static DEFAULT: LazyLock<Arc<SimplexSampler>> = LazyLock::new(|| {
    let mut rng = StdRng::from_os_rng();
    Arc::new(SimplexSampler::from_rng(&mut rng))
});

static BY_SEED: LazyLock<Mutex<HashMap<i64, Arc<SimplexSampler>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

const GRAD3: [[f64; 3]; 12] = [
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0],
    [0.0, -1.0, 1.0],
    [0.0, 1.0, -1.0],
    [0.0, -1.0, -1.0],
];

/// 2/3-D simplex noise over a seeded gradient lattice. Output is in [-1, 1].
pub struct SimplexSampler {
    perm: [u8; 512],
    perm_mod12: [u8; 512],
}

impl SimplexSampler {
    pub(crate) fn from_rng(rng: &mut StdRng) -> Self {
        let perm = permutation_table(rng);
        let perm_mod12 = std::array::from_fn(|i| perm[i] % 12);
        SimplexSampler { perm, perm_mod12 }
    }

    /// The process-default sampler (random lattice, fixed for this run)
    pub fn default_instance() -> Arc<SimplexSampler> {
        Arc::clone(&DEFAULT)
    }

    /// The cached sampler for `seed`
    pub fn seeded(seed: i64) -> Arc<SimplexSampler> {
        Arc::clone(
            BY_SEED
                .lock()
                .unwrap()
                .entry(seed)
                .or_insert_with(|| Arc::new(SimplexSampler::from_rng(&mut rng_for_seed(seed)))),
        )
    }

    pub fn sample2d(&self, x: f64, y: f64) -> f64 {
        // Skewing factors for the 2-D simplex grid
        let f2 = 0.5 * (3.0f64.sqrt() - 1.0);
        let g2 = (3.0 - 3.0f64.sqrt()) / 6.0;

        let s = (x + y) * f2;
        let i = (x + s).floor();
        let j = (y + s).floor();
        let t = (i + j) * g2;
        let x0 = x - (i - t);
        let y0 = y - (j - t);

        // Offsets of the middle corner in (i, j) coordinates
        let (i1, j1) = if x0 > y0 { (1.0, 0.0) } else { (0.0, 1.0) };

        let x1 = x0 - i1 + g2;
        let y1 = y0 - j1 + g2;
        let x2 = x0 - 1.0 + 2.0 * g2;
        let y2 = y0 - 1.0 + 2.0 * g2;

        let ii = (i as i64 & 255) as usize;
        let jj = (j as i64 & 255) as usize;
        let gi0 = self.perm_mod12[ii + self.perm[jj] as usize] as usize;
        let gi1 = self.perm_mod12[ii + i1 as usize + self.perm[jj + j1 as usize] as usize] as usize;
        let gi2 = self.perm_mod12[ii + 1 + self.perm[jj + 1] as usize] as usize;

        let mut total = 0.0;
        for (gi, cx, cy) in [(gi0, x0, y0), (gi1, x1, y1), (gi2, x2, y2)] {
            let t = 0.5 - cx * cx - cy * cy;
            if t > 0.0 {
                let t = t * t;
                total += t * t * (GRAD3[gi][0] * cx + GRAD3[gi][1] * cy);
            }
        }
        // Scale to roughly [-1, 1]
        70.0 * total
    }

    pub fn sample3d(&self, x: f64, y: f64, z: f64) -> f64 {
        let f3 = 1.0 / 3.0;
        let g3 = 1.0 / 6.0;

        let s = (x + y + z) * f3;
        let i = (x + s).floor();
        let j = (y + s).floor();
        let k = (z + s).floor();
        let t = (i + j + k) * g3;
        let x0 = x - (i - t);
        let y0 = y - (j - t);
        let z0 = z - (k - t);

        // Rank the coordinates to pick the simplex traversal order
        let (i1, j1, k1, i2, j2, k2) = if x0 >= y0 {
            if y0 >= z0 {
                (1, 0, 0, 1, 1, 0)
            } else if x0 >= z0 {
                (1, 0, 0, 1, 0, 1)
            } else {
                (0, 0, 1, 1, 0, 1)
            }
        } else if y0 < z0 {
            (0, 0, 1, 0, 1, 1)
        } else if x0 < z0 {
            (0, 1, 0, 0, 1, 1)
        } else {
            (0, 1, 0, 1, 1, 0)
        };

        let x1 = x0 - i1 as f64 + g3;
        let y1 = y0 - j1 as f64 + g3;
        let z1 = z0 - k1 as f64 + g3;
        let x2 = x0 - i2 as f64 + 2.0 * g3;
        let y2 = y0 - j2 as f64 + 2.0 * g3;
        let z2 = z0 - k2 as f64 + 2.0 * g3;
        let x3 = x0 - 1.0 + 3.0 * g3;
        let y3 = y0 - 1.0 + 3.0 * g3;
        let z3 = z0 - 1.0 + 3.0 * g3;

        let ii = (i as i64 & 255) as usize;
        let jj = (j as i64 & 255) as usize;
        let kk = (k as i64 & 255) as usize;

        let p = &self.perm;
        let gi0 = self.perm_mod12[ii + p[jj + p[kk] as usize] as usize] as usize;
        let gi1 = self.perm_mod12[ii + i1 + p[jj + j1 + p[kk + k1] as usize] as usize] as usize;
        let gi2 = self.perm_mod12[ii + i2 + p[jj + j2 + p[kk + k2] as usize] as usize] as usize;
        let gi3 = self.perm_mod12[ii + 1 + p[jj + 1 + p[kk + 1] as usize] as usize] as usize;

        let mut total = 0.0;
        for (gi, cx, cy, cz) in [
            (gi0, x0, y0, z0),
            (gi1, x1, y1, z1),
            (gi2, x2, y2, z2),
            (gi3, x3, y3, z3),
        ] {
            let t = 0.6 - cx * cx - cy * cy - cz * cz;
            if t > 0.0 {
                let t = t * t;
                total += t * t * (GRAD3[gi][0] * cx + GRAD3[gi][1] * cy + GRAD3[gi][2] * cz);
            }
        }
        // Scale to roughly [-1, 1]
        32.0 * total
    }
}
