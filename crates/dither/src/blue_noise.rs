use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::debug;

use crate::DitherError;

/// Gaussian spread used by the energy filter when none is requested.
pub const DEFAULT_SIGMA: f32 = 1.9;

/// Parameters for the void-and-cluster generator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlueNoiseConfig {
    /// Edge length of the square, toroidally wrapped grid.
    pub size: u32,
    /// Standard deviation of the energy filter, in pixels.
    pub sigma: f32,
    /// Seed for the initial random point set.
    pub seed: u64,
}

impl Default for BlueNoiseConfig {
    fn default() -> Self {
        Self {
            size: 64,
            sigma: DEFAULT_SIGMA,
            seed: 0,
        }
    }
}

/// Generates a blue-noise rank map with the void-and-cluster method.
///
/// The result is row-major and holds every rank in `0..size*size` exactly
/// once. Thresholding it at any level yields an evenly spread point set.
pub fn blue_noise(config: BlueNoiseConfig) -> Result<Vec<u32>, DitherError> {
    let BlueNoiseConfig { size, sigma, seed } = config;
    if !(2..=256).contains(&size) {
        return Err(DitherError::InvalidNoiseSize(size));
    }
    if !sigma.is_finite() || sigma <= 0.0 {
        return Err(DitherError::InvalidSigma(sigma));
    }

    let size = size as usize;
    let total = size * size;
    let kernel = gaussian_kernel(size, sigma);

    let mut rng = StdRng::seed_from_u64(seed);
    let mut order: Vec<usize> = (0..total).collect();
    order.shuffle(&mut rng);
    let initial_count = (total / 10).max(1);

    let mut field = EnergyField::new(size, &kernel);
    for &index in &order[..initial_count] {
        field.insert(index);
    }
    field.relax();
    let prototype = field.clone();

    let mut ranks = vec![0u32; total];

    // Ranks below the prototype count: peel tightest clusters off a copy.
    let mut remaining = initial_count;
    while remaining > 0 {
        let cluster = field.tightest_cluster();
        field.remove(cluster);
        remaining -= 1;
        ranks[cluster] = remaining as u32;
    }

    // Remaining ranks: fill the largest voids of the prototype. With a wrapped
    // kernel the energy of the zeros is the complement of the energy of the
    // ones, so the largest void also covers the majority phase.
    let mut field = prototype;
    for rank in initial_count..total {
        let void = field.largest_void();
        field.insert(void);
        ranks[void] = rank as u32;
    }

    debug!(size, sigma, seed, "generated blue-noise rank map");
    Ok(ranks)
}

/// Gaussian weights for every toroidal offset `(dx, dy)` on the grid.
fn gaussian_kernel(size: usize, sigma: f32) -> Vec<f32> {
    let denominator = 2.0 * sigma * sigma;
    let mut kernel = vec![0.0f32; size * size];
    for dy in 0..size {
        let wy = dy.min(size - dy) as f32;
        for dx in 0..size {
            let wx = dx.min(size - dx) as f32;
            kernel[dy * size + dx] = (-(wx * wx + wy * wy) / denominator).exp();
        }
    }
    kernel
}

#[derive(Clone)]
struct EnergyField<'k> {
    size: usize,
    kernel: &'k [f32],
    occupied: Vec<bool>,
    energy: Vec<f32>,
}

impl<'k> EnergyField<'k> {
    fn new(size: usize, kernel: &'k [f32]) -> Self {
        Self {
            size,
            kernel,
            occupied: vec![false; size * size],
            energy: vec![0.0; size * size],
        }
    }

    fn insert(&mut self, index: usize) {
        self.occupied[index] = true;
        self.splat(index, 1.0);
    }

    fn remove(&mut self, index: usize) {
        self.occupied[index] = false;
        self.splat(index, -1.0);
    }

    fn splat(&mut self, index: usize, sign: f32) {
        let size = self.size;
        let (px, py) = (index % size, index / size);
        for y in 0..size {
            let dy = (y + size - py) % size;
            for x in 0..size {
                let dx = (x + size - px) % size;
                self.energy[y * size + x] += sign * self.kernel[dy * size + dx];
            }
        }
    }

    /// Occupied cell with the highest energy.
    fn tightest_cluster(&self) -> usize {
        self.extreme(true, |candidate, best| candidate > best)
    }

    /// Empty cell with the lowest energy.
    fn largest_void(&self) -> usize {
        self.extreme(false, |candidate, best| candidate < best)
    }

    fn extreme(&self, occupied: bool, better: impl Fn(f32, f32) -> bool) -> usize {
        let mut best: Option<(usize, f32)> = None;
        for (index, &energy) in self.energy.iter().enumerate() {
            if self.occupied[index] != occupied {
                continue;
            }
            match best {
                Some((_, current)) if !better(energy, current) => {}
                _ => best = Some((index, energy)),
            }
        }
        best.map(|(index, _)| index).unwrap_or(0)
    }

    /// Moves points from clusters into voids until the pattern is stable.
    fn relax(&mut self) {
        let limit = self.occupied.len() * 4;
        for _ in 0..limit {
            let cluster = self.tightest_cluster();
            self.remove(cluster);
            let void = self.largest_void();
            self.insert(void);
            if void == cluster {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small(seed: u64) -> BlueNoiseConfig {
        BlueNoiseConfig {
            size: 16,
            sigma: DEFAULT_SIGMA,
            seed,
        }
    }

    #[test]
    fn ranks_form_a_permutation() {
        let mut ranks = blue_noise(small(7)).unwrap();
        ranks.sort_unstable();
        let expected: Vec<u32> = (0..256).collect();
        assert_eq!(ranks, expected);
    }

    #[test]
    fn same_seed_is_deterministic() {
        assert_eq!(blue_noise(small(3)).unwrap(), blue_noise(small(3)).unwrap());
    }

    #[test]
    fn low_ranks_are_spread_out() {
        // The sparsest points of a 16x16 map never sit next to each other.
        let ranks = blue_noise(small(11)).unwrap();
        let size = 16usize;
        let points: Vec<(usize, usize)> = ranks
            .iter()
            .enumerate()
            .filter(|(_, rank)| **rank < 8)
            .map(|(index, _)| (index % size, index / size))
            .collect();
        assert_eq!(points.len(), 8);
        for (i, a) in points.iter().enumerate() {
            for b in &points[i + 1..] {
                let dx = a.0.abs_diff(b.0).min(size - a.0.abs_diff(b.0));
                let dy = a.1.abs_diff(b.1).min(size - a.1.abs_diff(b.1));
                assert!(dx.max(dy) > 1, "points {a:?} and {b:?} touch");
            }
        }
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(matches!(
            blue_noise(BlueNoiseConfig {
                size: 1,
                ..small(0)
            }),
            Err(DitherError::InvalidNoiseSize(1))
        ));
        assert!(matches!(
            blue_noise(BlueNoiseConfig {
                sigma: 0.0,
                ..small(0)
            }),
            Err(DitherError::InvalidSigma(_))
        ));
    }
}
