use ndarray::{Array1, ArrayView1, ArrayView2, Axis};

use crate::{Result, error::check_len};

/// The smallest variance `RunningStat::std` reports.
pub const VARIANCE_FLOOR: f32 = 1e-2;

/// A mergeable streaming accumulator of per component mean and variance.
#[derive(Debug, Clone)]
pub struct RunningStat {
    sum: Array1<f32>,
    sumsq: Array1<f32>,
    count: f64,
}

impl RunningStat {
    /// Creates a new `RunningStat`.
    ///
    /// # Arguments
    /// * `shape` - The amount of components of every sample.
    /// * `eps` - Initial count and per component sum of squares, keeps the
    ///   statistics defined before the first increment.
    pub fn new(shape: usize, eps: f64) -> Self {
        Self {
            sum: Array1::zeros(shape),
            sumsq: Array1::from_elem(shape, eps as f32),
            count: eps,
        }
    }

    pub fn dim(&self) -> usize {
        self.sum.len()
    }

    pub fn count(&self) -> f64 {
        self.count
    }

    pub fn sum(&self) -> ArrayView1<'_, f32> {
        self.sum.view()
    }

    pub fn sumsq(&self) -> ArrayView1<'_, f32> {
        self.sumsq.view()
    }

    /// Merges precomputed sums into this accumulator.
    ///
    /// # Arguments
    /// * `sum` - Per component sum of the samples.
    /// * `sumsq` - Per component sum of the squared samples.
    /// * `count` - The amount of samples.
    ///
    /// # Returns
    /// An error if the sums don't have this accumulator's shape.
    pub fn increment(&mut self, sum: &[f32], sumsq: &[f32], count: f64) -> Result<()> {
        self.merge(sum.into(), sumsq.into(), count)
    }

    /// Accumulates every row of `obs` as a sample.
    pub fn increment_from_obs(&mut self, obs: ArrayView2<f32>) -> Result<()> {
        let sum = obs.sum_axis(Axis(0));
        let sumsq = obs.mapv(|x| x * x).sum_axis(Axis(0));
        self.merge(sum.view(), sumsq.view(), obs.nrows() as f64)
    }

    fn merge(&mut self, sum: ArrayView1<f32>, sumsq: ArrayView1<f32>, count: f64) -> Result<()> {
        check_len("ob stat sum", sum.len(), self.dim())?;
        check_len("ob stat sumsq", sumsq.len(), self.dim())?;

        self.sum += &sum;
        self.sumsq += &sumsq;
        self.count += count;
        Ok(())
    }

    pub fn mean(&self) -> Array1<f32> {
        &self.sum / self.count as f32
    }

    /// The per component standard deviation, with the variance floored at `VARIANCE_FLOOR`.
    pub fn std(&self) -> Array1<f32> {
        let mean = self.mean();
        let mut var = &self.sumsq / self.count as f32 - &mean * &mean;
        var.mapv_inplace(|v| v.max(VARIANCE_FLOOR).sqrt());
        var
    }

    /// Overwrites the accumulator as if `count` samples with the given moments had been seen.
    pub fn set_from_init(&mut self, mean: &[f32], std: &[f32], count: f64) -> Result<()> {
        check_len("ob stat mean", mean.len(), self.dim())?;
        check_len("ob stat std", std.len(), self.dim())?;

        let mean = ArrayView1::from(mean);
        let std = ArrayView1::from(std);
        let count_f32 = count as f32;

        self.sum = &mean * count_f32;
        self.sumsq = (&mean * &mean + &std * &std) * count_f32;
        self.count = count;
        Ok(())
    }
}
