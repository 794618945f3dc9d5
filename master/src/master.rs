use std::{
    collections::HashSet,
    path::PathBuf,
    sync::Arc,
    time::Instant,
};

use comms::{
    relay::MasterClient,
    specs::{
        result::{NoiseOutcome, Outcome},
        task::{ObNorm, Task, TaskId, TaskMeta},
    },
};
use es_core::{
    Config, RunningStat, SharedNoiseTable,
    gradient::{DEFAULT_BATCH_SIZE, batched_weighted_sum},
    policy::Policy,
    returns::process_returns,
};
use log::{info, warn};

use crate::{
    MasterErr, Result, TimestepLimit,
    metrics::{IterationStats, mean, pop_rank, std_dev},
    optimization::Optimizer,
    snapshot::save_snapshot,
};

/// The results popped while waiting for a task's batch to fill.
#[derive(Debug, Default)]
struct Batch {
    noise: Vec<NoiseOutcome>,
    eval_returns: Vec<f32>,
    eval_lengths: Vec<f64>,
    worker_ids: Vec<u32>,
    episodes: usize,
    timesteps: usize,
    skipped: usize,
    ob_count: f64,
}

/// Coordinates an evolution strategies run.
///
/// Every iteration publishes the current parameters as a new task, waits
/// for enough rollouts of that task, estimates a gradient from them and
/// lets the optimizer update the parameters.
pub struct Master<C: MasterClient> {
    client: C,
    config: Config,
    noise: Arc<SharedNoiseTable>,
    policy: Box<dyn Policy>,
    optimizer: Box<dyn Optimizer>,
    ob_stat: RunningStat,
    limit: TimestepLimit,
    log_dir: PathBuf,
    episodes_so_far: usize,
    timesteps_so_far: usize,
    started: Instant,
}

impl<C: MasterClient> Master<C> {
    pub(crate) fn new(
        client: C,
        config: Config,
        noise: Arc<SharedNoiseTable>,
        policy: Box<dyn Policy>,
        optimizer: Box<dyn Optimizer>,
        ob_stat: RunningStat,
        log_dir: PathBuf,
    ) -> Self {
        Self {
            limit: TimestepLimit::from(config.episode_cutoff),
            client,
            config,
            noise,
            policy,
            optimizer,
            ob_stat,
            log_dir,
            episodes_so_far: 0,
            timesteps_so_far: 0,
            started: Instant::now(),
        }
    }

    pub fn policy(&self) -> &dyn Policy {
        self.policy.as_ref()
    }

    pub fn ob_stat(&self) -> &RunningStat {
        &self.ob_stat
    }

    pub fn timestep_limit(&self) -> Option<usize> {
        self.limit.get()
    }

    /// Runs iterations until one of them fails.
    pub async fn run(&mut self) -> Result<()> {
        loop {
            self.step().await?;
        }
    }

    /// Runs a single iteration.
    ///
    /// # Returns
    /// The iteration's statistics or an error if the run can't go on.
    pub async fn step(&mut self) -> Result<IterationStats> {
        let iter_started = Instant::now();
        let theta = self.policy.trainable_flat().to_vec();

        let task_id = self.publish(theta.clone()).await?;
        info!("********** Iteration {task_id} **********");

        let batch = self.collect(task_id).await?;
        let results = batch.noise.len();
        let skipped_frac = batch.skipped as f64 / (batch.skipped + results) as f64;

        if batch.skipped > 0 {
            warn!(
                "Skipped {} out of date results ({:.2}%)",
                batch.skipped,
                100. * skipped_frac
            );
        }

        let returns: Vec<[f32; 2]> = batch.noise.iter().flat_map(|r| r.returns.iter().copied()).collect();
        let lengths: Vec<[usize; 2]> = batch.noise.iter().flat_map(|r| r.lengths.iter().copied()).collect();

        let grad = self.gradient(&batch.noise, theta.len())?;
        let update_ratio = self.update_params(&theta, &grad)?;

        if let Some((old, new)) = self.limit.adapt(&lengths) {
            info!("Increased timestep limit from {old} to {new}");
        }

        let flat_returns = returns.as_flattened();
        let flat_lengths: Vec<f64> = lengths.as_flattened().iter().map(|&l| l as f64).collect();
        let unique_workers = batch.worker_ids.iter().collect::<HashSet<_>>().len();

        let stats = IterationStats {
            task_id,
            ep_rew_mean: mean(flat_returns),
            ep_rew_std: std_dev(flat_returns),
            ep_len_mean: mean(&flat_lengths),
            eval_ep_rew_mean: mean(&batch.eval_returns),
            eval_ep_rew_std: std_dev(&batch.eval_returns),
            eval_ep_len_mean: mean(&batch.eval_lengths),
            eval_pop_rank: pop_rank(flat_returns, &batch.eval_returns),
            eval_ep_count: batch.eval_returns.len(),
            norm: self.policy.trainable_flat().iter().map(|&p| (p as f64).powi(2)).sum(),
            grad_norm: grad.iter().map(|&g| (g as f64).powi(2)).sum(),
            update_ratio: update_ratio as f64,
            episodes_this_iter: flat_lengths.len(),
            episodes_so_far: self.episodes_so_far,
            timesteps_this_iter: batch.timesteps,
            timesteps_so_far: self.timesteps_so_far,
            unique_workers,
            unique_workers_frac: unique_workers as f64 / batch.worker_ids.len() as f64,
            results_skipped_frac: skipped_frac,
            ob_count: batch.ob_count,
            time_elapsed_this_iter: iter_started.elapsed().as_secs_f64(),
            time_elapsed: self.started.elapsed().as_secs_f64(),
        };
        info!("\n{stats}");

        let snapshot_freq = self.config.snapshot_freq as TaskId;
        if snapshot_freq != 0 && task_id % snapshot_freq == 0 {
            let path = save_snapshot(&self.log_dir, task_id, &batch.eval_returns, self.policy.as_ref())?;
            info!("Saved snapshot {}", path.display());
        }

        Ok(stats)
    }

    /// Publishes `theta` along with the current observation statistics and timestep limit.
    async fn publish(&mut self, theta: Vec<f32>) -> Result<TaskId> {
        let ob_stat = self.policy.needs_ob_stat().then(|| ObNorm {
            mean: self.ob_stat.mean().to_vec(),
            std: self.ob_stat.std().to_vec(),
        });

        let task = Task {
            params: theta,
            meta: TaskMeta {
                ob_stat,
                timestep_limit: self.limit.get(),
            },
        };

        Ok(self.client.declare_task(task).await?)
    }

    /// Pops results until the current task has enough episodes and timesteps.
    ///
    /// Every popped result counts towards the run totals, only the ones
    /// computed against `task_id` make it into the batch.
    async fn collect(&mut self, task_id: TaskId) -> Result<Batch> {
        let mut batch = Batch::default();

        while batch.episodes < self.config.episodes_per_batch
            || batch.timesteps < self.config.timesteps_per_batch
        {
            let (result_task_id, result) = self.client.pop_result().await?;
            let current = result_task_id == task_id;
            batch.worker_ids.push(result.worker_id);

            match result.outcome {
                Outcome::Eval {
                    eval_return,
                    eval_length,
                } => {
                    self.episodes_so_far += 1;
                    self.timesteps_so_far += eval_length;

                    if current {
                        batch.eval_returns.push(eval_return);
                        batch.eval_lengths.push(eval_length as f64);
                    }
                }
                Outcome::Noise(outcome) => {
                    let episodes = 2 * outcome.len();
                    let timesteps: usize = outcome.lengths.as_flattened().iter().sum();
                    self.episodes_so_far += episodes;
                    self.timesteps_so_far += timesteps;

                    outcome
                        .check_shapes(self.ob_stat.dim())
                        .map_err(|source| MasterErr::MalformedResult {
                            task_id: result_task_id,
                            worker_id: result.worker_id,
                            source,
                        })?;

                    if !current {
                        batch.skipped += 1;
                        continue;
                    }

                    if let Some(delta) = outcome.ob_stat.as_ref().filter(|_| self.policy.needs_ob_stat()) {
                        self.ob_stat.increment(&delta.sum, &delta.sumsq, delta.count)?;
                        batch.ob_count += delta.count;
                    }

                    batch.episodes += episodes;
                    batch.timesteps += timesteps;
                    batch.noise.push(outcome);
                }
            }
        }

        Ok(batch)
    }

    /// Estimates the gradient of the expected return from the batch's antithetic pairs.
    fn gradient(&self, noise: &[NoiseOutcome], num_params: usize) -> Result<Vec<f32>> {
        let noise_inds: Vec<usize> = noise.iter().flat_map(|r| r.noise_inds.iter().copied()).collect();
        let returns: Vec<[f32; 2]> = noise.iter().flat_map(|r| r.returns.iter().copied()).collect();
        let sign_returns: Vec<[f32; 2]> = noise
            .iter()
            .flat_map(|r| r.sign_returns.iter().copied())
            .collect();

        let processed = process_returns(self.config.return_proc_mode, &returns, &sign_returns);
        let weights: Vec<f32> = processed.iter().map(|[pos, neg]| pos - neg).collect();
        let vecs = noise_inds
            .iter()
            .map(|&i| self.noise.get(i, num_params))
            .collect::<es_core::Result<Vec<_>>>()?;

        let (mut grad, count) = batched_weighted_sum(&weights, vecs, num_params, DEFAULT_BATCH_SIZE)?;
        if count != noise_inds.len() {
            return Err(MasterErr::CountMismatch {
                processed: count,
                expected: noise_inds.len(),
            });
        }

        let n = (2 * returns.len()) as f32;
        grad.iter_mut().for_each(|g| *g /= n);
        Ok(grad)
    }

    /// Steps the policy's parameters against `-grad + l2coeff * theta`.
    ///
    /// # Returns
    /// The optimizer's update ratio.
    fn update_params(&mut self, theta: &[f32], grad: &[f32]) -> Result<f32> {
        let l2coeff = self.config.l2coeff;
        let direction: Vec<f32> = grad.iter().zip(theta).map(|(g, t)| -g + l2coeff * t).collect();

        let mut params = theta.to_vec();
        let ratio = self.optimizer.update_params(&direction, &mut params)?;
        self.policy.set_trainable_flat(&params)?;

        if self.policy.needs_ob_stat() {
            let (mean, std) = (self.ob_stat.mean(), self.ob_stat.std());
            self.policy.set_ob_stat(&mean.to_vec(), &std.to_vec())?;
        }

        Ok(ratio)
    }
}
