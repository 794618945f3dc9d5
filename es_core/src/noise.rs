use log::info;
use rand::{Rng, SeedableRng, rngs::StdRng};
use rand_distr::StandardNormal;
use rayon::prelude::*;

use crate::{EsErr, Result};

/// Values generated from one independently seeded generator.
const CHUNK_LEN: usize = 1 << 20;

/// A large read-only bank of standard normal values indexed by offset.
///
/// The same `(seed, len)` always produces the same table, so every process
/// of a run regenerates it instead of shipping it around. Within a process
/// it is shared behind an `Arc`.
pub struct SharedNoiseTable {
    noise: Box<[f32]>,
}

impl SharedNoiseTable {
    /// Creates a new `SharedNoiseTable`.
    ///
    /// # Arguments
    /// * `seed` - The seed every chunk's generator is derived from.
    /// * `len` - The amount of values in the table.
    pub fn new(seed: u64, len: usize) -> Self {
        info!(seed = seed, len = len; "sampling noise table");

        let mut noise = vec![0.0; len].into_boxed_slice();
        noise
            .par_chunks_mut(CHUNK_LEN)
            .enumerate()
            .for_each(|(i, chunk)| {
                let mut rng = StdRng::seed_from_u64(chunk_seed(seed, i));
                chunk.iter_mut().for_each(|x| *x = rng.sample(StandardNormal));
            });

        info!(bytes = len * size_of::<f32>(); "sampled noise table");
        Self { noise }
    }

    pub fn len(&self) -> usize {
        self.noise.len()
    }

    pub fn is_empty(&self) -> bool {
        self.noise.is_empty()
    }

    /// Returns the `dim` values starting at `index`.
    ///
    /// # Arguments
    /// * `index` - The offset of the first value.
    /// * `dim` - The amount of values.
    ///
    /// # Returns
    /// The noise slice or an error if it does not fit in the table.
    pub fn get(&self, index: usize, dim: usize) -> Result<&[f32]> {
        let len = self.noise.len();

        match index.checked_add(dim) {
            Some(end) if end <= len => Ok(&self.noise[index..end]),
            _ => Err(EsErr::NoiseOutOfBounds { index, dim, len }),
        }
    }

    /// Draws an offset uniformly from `[0, len - dim]`, so that `get(index, dim)` always succeeds.
    pub fn sample_index<R: Rng + ?Sized>(&self, rng: &mut R, dim: usize) -> Result<usize> {
        let len = self.noise.len();

        if dim > len {
            return Err(EsErr::NoiseOutOfBounds { index: 0, dim, len });
        }

        Ok(rng.random_range(0..=len - dim))
    }
}

fn chunk_seed(seed: u64, chunk: usize) -> u64 {
    seed ^ (chunk as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_table() {
        let a = SharedNoiseTable::new(7, CHUNK_LEN + 100);
        let b = SharedNoiseTable::new(7, CHUNK_LEN + 100);
        let c = SharedNoiseTable::new(8, CHUNK_LEN + 100);

        assert_eq!(a.noise, b.noise);
        assert_ne!(a.noise, c.noise);
    }

    #[test]
    fn values_look_standard_normal() {
        let table = SharedNoiseTable::new(123, 100_000);
        let n = table.len() as f64;
        let mean = table.noise.iter().map(|&x| x as f64).sum::<f64>() / n;
        let var = table.noise.iter().map(|&x| (x as f64 - mean).powi(2)).sum::<f64>() / n;

        assert!(mean.abs() < 0.02, "mean {mean}");
        assert!((var - 1.0).abs() < 0.03, "var {var}");
    }

    #[test]
    fn sampled_indices_stay_in_bounds() {
        let table = SharedNoiseTable::new(0, 64);
        let mut rng = StdRng::seed_from_u64(3);

        for dim in [1, 10, 63, 64] {
            for _ in 0..200 {
                let index = table.sample_index(&mut rng, dim).unwrap();
                assert!(index + dim <= table.len());
                assert_eq!(table.get(index, dim).unwrap().len(), dim);
            }
        }
    }

    #[test]
    fn full_width_sample_always_starts_at_zero() {
        let table = SharedNoiseTable::new(0, 16);
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(table.sample_index(&mut rng, 16).unwrap(), 0);
    }

    #[test]
    fn out_of_bounds_requests_fail() {
        let table = SharedNoiseTable::new(0, 16);
        let mut rng = StdRng::seed_from_u64(1);

        assert!(table.get(10, 7).is_err());
        assert!(table.get(usize::MAX, 2).is_err());
        assert!(table.sample_index(&mut rng, 17).is_err());
    }
}
