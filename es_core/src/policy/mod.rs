mod linear;
mod snapshot;

use std::path::Path;

use comms::specs::experiment::PolicySpec;
use ndarray::Array2;
use rand::{RngCore, SeedableRng, rngs::StdRng};

pub use linear::LinearPolicy;
pub use snapshot::{INIT_OB_COUNT, PolicySnapshot};

use crate::{Result, RunningStat, env::Environment};

/// The outcome of one episode.
#[derive(Debug, Clone, PartialEq)]
pub struct Rollout {
    /// One reward per timestep.
    pub rewards: Vec<f32>,
    /// One observation per timestep, only when asked for.
    pub obs: Option<Array2<f32>>,
}

impl Rollout {
    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// The episode's return.
    pub fn total(&self) -> f32 {
        self.rewards.iter().sum()
    }

    /// The sum of the reward signs, with the sign of zero being zero.
    pub fn sign_total(&self) -> f32 {
        self.rewards.iter().map(|&r| sign(r)).sum()
    }
}

fn sign(x: f32) -> f32 {
    if x > 0.0 {
        1.0
    } else if x < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// A parameterized controller whose flat trainable parameters are optimized.
pub trait Policy: Send {
    fn num_params(&self) -> usize;

    fn trainable_flat(&self) -> &[f32];

    /// Replaces every trainable parameter.
    ///
    /// # Returns
    /// An error if `params` doesn't have `num_params` values.
    fn set_trainable_flat(&mut self, params: &[f32]) -> Result<()>;

    /// Whether observations are normalized with running statistics.
    fn needs_ob_stat(&self) -> bool;

    fn set_ob_stat(&mut self, mean: &[f32], std: &[f32]) -> Result<()>;

    /// The normalization statistics in use, if the policy needs any.
    fn ob_stat(&self) -> Option<(&[f32], &[f32])>;

    /// Runs one episode.
    ///
    /// # Arguments
    /// * `env` - The environment to act in.
    /// * `timestep_limit` - An extra cap on the episode length, on top of the environment's.
    /// * `save_obs` - Whether to return the observations.
    /// * `rng` - The randomness source of both the environment and the action noise.
    fn rollout(
        &mut self,
        env: &mut dyn Environment,
        timestep_limit: Option<usize>,
        save_obs: bool,
        rng: &mut dyn RngCore,
    ) -> Result<Rollout>;

    /// Writes the policy into a new file at `path`, an existing file is never overwritten.
    fn save(&self, path: &Path) -> Result<()> {
        PolicySnapshot::of(self).write_new(path)
    }

    /// Loads the parameters saved at `path`.
    ///
    /// When the snapshot carries observation statistics they are also loaded
    /// into `ob_stat`, weighted as `INIT_OB_COUNT` samples.
    fn initialize_from(&mut self, path: &Path, ob_stat: &mut RunningStat) -> Result<()> {
        let snapshot = PolicySnapshot::read(path)?;
        self.set_trainable_flat(&snapshot.params)?;

        if let Some(norm) = snapshot.ob_stat.filter(|_| self.needs_ob_stat()) {
            ob_stat.set_from_init(&norm.mean, &norm.std, INIT_OB_COUNT)?;
            self.set_ob_stat(&norm.mean, &norm.std)?;
        }

        Ok(())
    }
}

/// Builds the policy described by `spec` for acting in `env`.
///
/// # Arguments
/// * `spec` - The policy specification.
/// * `env` - The environment, which fixes the observation and action sizes.
/// * `seed` - An optional seed for the initial parameters.
pub fn build_policy(
    spec: &PolicySpec,
    env: &dyn Environment,
    seed: Option<u64>,
) -> Result<Box<dyn Policy>> {
    let mut rng = seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

    match *spec {
        PolicySpec::Linear {
            ac_noise_std,
            init_std,
            needs_ob_stat,
        } => {
            let policy = LinearPolicy::new(
                env.observation_dim(),
                env.action_dim(),
                ac_noise_std,
                init_std,
                needs_ob_stat,
                &mut rng,
            )?;

            Ok(Box::new(policy))
        }
    }
}
