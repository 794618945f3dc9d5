//! Batched accumulation of weighted noise vectors.

use std::num::NonZeroUsize;

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::{Result, error::check_len};

/// The amount of noise vectors stacked into one matrix product.
pub const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(500).unwrap();

/// An iterator over consecutive groups of at most `size` items.
pub struct Groups<I: Iterator> {
    iter: I,
    size: usize,
}

impl<I: Iterator> Iterator for Groups<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let group: Vec<_> = self.iter.by_ref().take(self.size).collect();
        (!group.is_empty()).then_some(group)
    }
}

/// Groups `items` into vectors of `size` items, the last one may be shorter.
pub fn itergroups<I: IntoIterator>(items: I, size: NonZeroUsize) -> Groups<I::IntoIter> {
    Groups {
        iter: items.into_iter(),
        size: size.get(),
    }
}

/// Computes `Σ weights[i] · vecs[i]` a batch at a time.
///
/// # Arguments
/// * `weights` - One weight per vector.
/// * `vecs` - The vectors, pulled lazily.
/// * `dim` - The length every vector must have.
/// * `batch_size` - How many vectors are stacked for each product.
///
/// # Returns
/// The weighted sum and the amount of vectors that were summed, which is
/// the shorter of `weights` and `vecs`. An error if a vector's length is not `dim`.
pub fn batched_weighted_sum<'a, V>(
    weights: &[f32],
    vecs: V,
    dim: usize,
    batch_size: NonZeroUsize,
) -> Result<(Vec<f32>, usize)>
where
    V: IntoIterator<Item = &'a [f32]>,
{
    let mut total = Array1::<f32>::zeros(dim);
    let mut summed = 0;
    let mut matrix = Vec::with_capacity(batch_size.get() * dim);

    for (batch_weights, batch_vecs) in weights.chunks(batch_size.get()).zip(itergroups(vecs, batch_size)) {
        let rows = batch_weights.len().min(batch_vecs.len());

        matrix.clear();
        for vec in &batch_vecs[..rows] {
            check_len("noise vector", vec.len(), dim)?;
            matrix.extend_from_slice(vec);
        }

        let Ok(matrix) = ArrayView2::from_shape((rows, dim), &matrix) else {
            return Err(crate::EsErr::SizeMismatch {
                what: "noise batch",
                got: matrix.len(),
                expected: rows * dim,
            });
        };

        total += &ArrayView1::from(&batch_weights[..rows]).dot(&matrix);
        summed += rows;
    }

    Ok((total.to_vec(), summed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vecs(n: usize, dim: usize) -> Vec<Vec<f32>> {
        (0..n)
            .map(|i| (0..dim).map(|j| ((i * 7 + j * 3) % 11) as f32 - 5.0).collect())
            .collect()
    }

    fn naive(weights: &[f32], vecs: &[Vec<f32>], dim: usize) -> Vec<f32> {
        let mut out = vec![0.0; dim];
        for (w, v) in weights.iter().zip(vecs) {
            for (o, x) in out.iter_mut().zip(v) {
                *o += w * x;
            }
        }
        out
    }

    #[test]
    fn groups_keep_order_and_short_tail() {
        let size = NonZeroUsize::new(3).unwrap();
        let groups: Vec<_> = itergroups(0..8, size).collect();

        assert_eq!(groups, [vec![0, 1, 2], vec![3, 4, 5], vec![6, 7]]);
        assert_eq!(itergroups(0..0, size).count(), 0);
    }

    #[test]
    fn result_does_not_depend_on_batch_size() {
        let (n, dim) = (23, 5);
        let vecs = vecs(n, dim);
        let weights: Vec<f32> = (0..n).map(|i| (i as f32 - 11.0) / 4.0).collect();
        let expected = naive(&weights, &vecs, dim);

        for batch in [1, 7, n] {
            let batch = NonZeroUsize::new(batch).unwrap();
            let (sum, count) =
                batched_weighted_sum(&weights, vecs.iter().map(Vec::as_slice), dim, batch)
                    .unwrap();

            assert_eq!(count, n);
            for (a, b) in sum.iter().zip(&expected) {
                assert!((a - b).abs() < 1e-3, "{sum:?} != {expected:?}");
            }
        }
    }

    #[test]
    fn count_stops_at_shorter_input() {
        let vecs = vecs(4, 2);
        let (_, count) = batched_weighted_sum(
            &[1.0; 6],
            vecs.iter().map(Vec::as_slice),
            2,
            NonZeroUsize::new(4).unwrap(),
        )
        .unwrap();

        assert_eq!(count, 4);
    }

    #[test]
    fn wrong_vector_length_is_an_error() {
        let vecs = [vec![1.0, 2.0], vec![1.0]];
        let result = batched_weighted_sum(
            &[1.0, 1.0],
            vecs.iter().map(Vec::as_slice),
            2,
            DEFAULT_BATCH_SIZE,
        );

        assert!(result.is_err());
    }
}
