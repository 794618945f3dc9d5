//! Per iteration statistics of the master.

use std::fmt::{self, Display};

/// What the master reports after every iteration.
///
/// Means and deviations over empty sets are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationStats {
    pub task_id: u64,
    pub ep_rew_mean: f64,
    pub ep_rew_std: f64,
    pub ep_len_mean: f64,
    pub eval_ep_rew_mean: f64,
    pub eval_ep_rew_std: f64,
    pub eval_ep_len_mean: f64,
    /// Mean fraction of this iteration's noise returns below each evaluation return.
    pub eval_pop_rank: f64,
    pub eval_ep_count: usize,
    /// Squared L2 norm of the parameters after the update.
    pub norm: f64,
    /// Squared L2 norm of the gradient estimate.
    pub grad_norm: f64,
    pub update_ratio: f64,
    pub episodes_this_iter: usize,
    pub episodes_so_far: usize,
    pub timesteps_this_iter: usize,
    pub timesteps_so_far: usize,
    pub unique_workers: usize,
    pub unique_workers_frac: f64,
    pub results_skipped_frac: f64,
    pub ob_count: f64,
    pub time_elapsed_this_iter: f64,
    pub time_elapsed: f64,
}

impl IterationStats {
    fn rows(&self) -> [(&'static str, f64); 21] {
        [
            ("EpRewMean", self.ep_rew_mean),
            ("EpRewStd", self.ep_rew_std),
            ("EpLenMean", self.ep_len_mean),
            ("EvalEpRewMean", self.eval_ep_rew_mean),
            ("EvalEpRewStd", self.eval_ep_rew_std),
            ("EvalEpLenMean", self.eval_ep_len_mean),
            ("EvalPopRank", self.eval_pop_rank),
            ("EvalEpCount", self.eval_ep_count as f64),
            ("Norm", self.norm),
            ("GradNorm", self.grad_norm),
            ("UpdateRatio", self.update_ratio),
            ("EpisodesThisIter", self.episodes_this_iter as f64),
            ("EpisodesSoFar", self.episodes_so_far as f64),
            ("TimestepsThisIter", self.timesteps_this_iter as f64),
            ("TimestepsSoFar", self.timesteps_so_far as f64),
            ("UniqueWorkers", self.unique_workers as f64),
            ("UniqueWorkersFrac", self.unique_workers_frac),
            ("ResultsSkippedFrac", self.results_skipped_frac),
            ("ObCount", self.ob_count),
            ("TimeElapsedThisIter", self.time_elapsed_this_iter),
            ("TimeElapsed", self.time_elapsed),
        ]
    }
}

impl Display for IterationStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let line = "-".repeat(39);

        writeln!(f, "{line}")?;
        for (name, value) in self.rows() {
            writeln!(f, "| {name:>19} | {value:>13.6} |")?;
        }
        write!(f, "{line}")
    }
}

pub(crate) fn mean<T: Copy + Into<f64>>(xs: &[T]) -> f64 {
    xs.iter().map(|&x| x.into()).sum::<f64>() / xs.len() as f64
}

/// The population standard deviation.
pub(crate) fn std_dev<T: Copy + Into<f64>>(xs: &[T]) -> f64 {
    let mean = mean(xs);
    let var = xs.iter().map(|&x| (x.into() - mean).powi(2)).sum::<f64>() / xs.len() as f64;
    var.sqrt()
}

/// The average position at which every value of `queries` would be inserted
/// into the sorted `population`, as a fraction of its size.
pub(crate) fn pop_rank(population: &[f32], queries: &[f32]) -> f64 {
    let mut sorted = population.to_vec();
    sorted.sort_by(f32::total_cmp);

    let ranks: Vec<f64> = queries
        .iter()
        .map(|q| sorted.partition_point(|x| x < q) as f64)
        .collect();

    mean(&ranks) / sorted.len() as f64
}
