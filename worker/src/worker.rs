use std::{sync::Arc, time::Instant};

use comms::{
    relay::WorkerClient,
    specs::{
        experiment::ExperimentSpec,
        result::{EsResult, NoiseOutcome, ObStatDelta, Outcome},
        task::{Task, TaskId},
    },
};
use es_core::{
    Config, ConfigErr, RunningStat, Setup, SharedNoiseTable,
    env::Environment,
    policy::{Policy, Rollout},
};
use log::{debug, info};
use rand::{Rng, SeedableRng, rngs::StdRng};
use tokio::task;

use crate::{Result, WorkerConfig};

/// Worker ids are drawn from `[0, 2^31)`.
const WORKER_ID_BOUND: u32 = 1 << 31;

/// Repeatedly evaluates the relay's current task and pushes back the outcome.
pub struct Worker<C: WorkerClient> {
    worker_id: u32,
    client: C,
    config: Config,
    worker_config: WorkerConfig,
    noise: Arc<SharedNoiseTable>,
    env: Box<dyn Environment>,
    policy: Box<dyn Policy>,
    rng: StdRng,
}

impl<C: WorkerClient> Worker<C> {
    /// Creates a new `Worker`, building its own environment and policy.
    ///
    /// # Arguments
    /// * `client` - The worker's handle on the relay.
    /// * `exp` - The experiment declared by the master.
    /// * `noise` - The noise table, which must match the master's.
    /// * `worker_config` - Runtime settings.
    ///
    /// # Returns
    /// The worker or an error if the experiment can't be run.
    pub fn new(
        client: C,
        exp: &ExperimentSpec,
        noise: Arc<SharedNoiseTable>,
        worker_config: WorkerConfig,
    ) -> Result<Self> {
        let Setup {
            config,
            env,
            policy,
        } = Setup::from_spec(exp)?;

        if noise.len() < policy.num_params() {
            return Err(ConfigErr::InvalidArg {
                name: "noise.len",
                reason: format!(
                    "{} values can't hold a perturbation of {} parameters",
                    noise.len(),
                    policy.num_params()
                ),
            }
            .into());
        }

        let mut rng = match worker_config.seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let worker_id = rng.random_range(0..WORKER_ID_BOUND);
        debug!(worker_id = worker_id; "worker set up");

        Ok(Self {
            worker_id,
            client,
            config,
            worker_config,
            noise,
            env,
            policy,
            rng,
        })
    }

    pub fn id(&self) -> u32 {
        self.worker_id
    }

    /// Gives back the relay handle, e.g. to disconnect it.
    pub fn into_client(self) -> C {
        self.client
    }

    /// Works on tasks until the relay goes away.
    pub async fn run(&mut self) -> Result<()> {
        info!(worker_id = self.worker_id; "worker started");

        loop {
            self.run_once().await?;
        }
    }

    /// Fetches the current task, computes an outcome for it and pushes it.
    ///
    /// The rollouts run on the current thread, so this must be driven by a
    /// multi threaded runtime.
    ///
    /// # Returns
    /// The id of the task the pushed result belongs to.
    pub async fn run_once(&mut self) -> Result<TaskId> {
        let (task_id, task) = self.client.get_current_task().await?;
        let started = Instant::now();

        let outcome = task::block_in_place(|| self.compute(&task, started))?;
        match &outcome {
            Outcome::Eval {
                eval_return,
                eval_length,
            } => info!(
                worker_id = self.worker_id,
                task_id = task_id,
                eval_return = *eval_return,
                eval_length = *eval_length;
                "evaluated task"
            ),
            Outcome::Noise(noise) => debug!(
                worker_id = self.worker_id,
                task_id = task_id,
                pairs = noise.len(),
                elapsed_ms = started.elapsed().as_millis() as u64;
                "perturbed task"
            ),
        }

        let result = EsResult {
            worker_id: self.worker_id,
            outcome,
        };
        self.client.push_result(task_id, result).await?;

        Ok(task_id)
    }

    fn compute(&mut self, task: &Task, started: Instant) -> Result<Outcome> {
        let num_params = self.policy.num_params();
        es_core::error::check_len("task params", task.params.len(), num_params)?;

        if let Some(norm) = task.meta.ob_stat.as_ref().filter(|_| self.policy.needs_ob_stat()) {
            self.policy.set_ob_stat(&norm.mean, &norm.std)?;
        }

        if self.rng.random::<f32>() < self.config.eval_prob {
            self.evaluate(task)
        } else {
            self.perturb(task, started)
        }
    }

    /// Runs one episode with the task's parameters as they are.
    ///
    /// The task's timestep limit does not apply to evaluations.
    fn evaluate(&mut self, task: &Task) -> Result<Outcome> {
        self.policy.set_trainable_flat(&task.params)?;
        let rollout = self
            .policy
            .rollout(self.env.as_mut(), None, false, &mut self.rng)?;

        Ok(Outcome::Eval {
            eval_return: rollout.total(),
            eval_length: rollout.len(),
        })
    }

    /// Runs antithetic pairs until there is at least one and the minimum
    /// task runtime elapsed.
    fn perturb(&mut self, task: &Task, started: Instant) -> Result<Outcome> {
        let num_params = self.policy.num_params();
        let noise = Arc::clone(&self.noise);
        let stdev = self.config.noise_stdev;
        let limit = task.meta.timestep_limit;

        let mut ob_stat = RunningStat::new(self.env.observation_dim(), 0.0);
        let mut outcome = NoiseOutcome {
            noise_inds: Vec::new(),
            returns: Vec::new(),
            sign_returns: Vec::new(),
            lengths: Vec::new(),
            ob_stat: None,
        };
        let mut params = vec![0.0; num_params];

        while outcome.is_empty() || started.elapsed() < self.worker_config.min_task_runtime() {
            let index = noise.sample_index(&mut self.rng, num_params)?;
            let v = noise.get(index, num_params)?;

            let mut returns = [0.0; 2];
            let mut sign_returns = [0.0; 2];
            let mut lengths = [0; 2];

            for (i, sign) in [1.0, -1.0].into_iter().enumerate() {
                params
                    .iter_mut()
                    .zip(task.params.iter().zip(v))
                    .for_each(|(p, (theta, eps))| *p = theta + sign * stdev * eps);
                self.policy.set_trainable_flat(&params)?;

                let rollout = self.rollout_and_update_ob_stat(limit, &mut ob_stat)?;
                returns[i] = rollout.total();
                sign_returns[i] = rollout.sign_total();
                lengths[i] = rollout.len();
            }

            outcome.noise_inds.push(index);
            outcome.returns.push(returns);
            outcome.sign_returns.push(sign_returns);
            outcome.lengths.push(lengths);
        }

        if ob_stat.count() > 0.0 {
            outcome.ob_stat = Some(ObStatDelta {
                sum: ob_stat.sum().to_vec(),
                sumsq: ob_stat.sumsq().to_vec(),
                count: ob_stat.count(),
            });
        }

        Ok(Outcome::Noise(outcome))
    }

    fn rollout_and_update_ob_stat(
        &mut self,
        limit: Option<usize>,
        ob_stat: &mut RunningStat,
    ) -> Result<Rollout> {
        let save_obs =
            self.policy.needs_ob_stat() && self.rng.random::<f32>() < self.config.calc_obstat_prob;

        let rollout = self
            .policy
            .rollout(self.env.as_mut(), limit, save_obs, &mut self.rng)?;

        if let Some(obs) = &rollout.obs {
            ob_stat.increment_from_obs(obs.view())?;
        }

        Ok(rollout)
    }
}
