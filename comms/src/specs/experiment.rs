use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// The hyper-parameters of an evolution strategies run, as found in the experiment file.
///
/// The two mode fields stay strings on the wire and are validated into
/// closed enums when the run is set up.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSpec {
    pub l2coeff: f32,
    pub noise_stdev: f32,
    pub episodes_per_batch: usize,
    pub timesteps_per_batch: usize,
    pub calc_obstat_prob: f32,
    pub eval_prob: f32,
    pub snapshot_freq: usize,
    pub return_proc_mode: String,
    pub episode_cutoff_mode: String,
}

/// The specification for the `Environment` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvSpec {
    PointMass {
        dim: usize,
        #[serde(default = "default_max_episode_steps")]
        max_episode_steps: usize,
    },
}

/// The specification for the `Policy` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicySpec {
    Linear {
        #[serde(default)]
        ac_noise_std: f32,
        #[serde(default = "default_init_std")]
        init_std: f32,
        #[serde(default)]
        needs_ob_stat: bool,
    },
}

/// The specification for the `Optimizer` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Sgd {
        stepsize: f32,
        #[serde(default = "default_momentum")]
        momentum: f32,
    },
    Adam {
        stepsize: f32,
        #[serde(default = "default_beta1")]
        beta1: f32,
        #[serde(default = "default_beta2")]
        beta2: f32,
        #[serde(default = "default_epsilon")]
        epsilon: f32,
    },
}

/// The specification for the shared noise table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseSpec {
    pub seed: u64,
    pub len: usize,
}

impl Default for NoiseSpec {
    fn default() -> Self {
        Self {
            seed: 123,
            len: 250_000_000,
        }
    }
}

/// Everything master and workers need to agree on before the first task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSpec {
    pub config: ConfigSpec,
    pub env: EnvSpec,
    pub policy: PolicySpec,
    pub optimizer: OptimizerSpec,
    #[serde(default)]
    pub noise: NoiseSpec,
    /// A policy snapshot the master starts from instead of a fresh initialization.
    #[serde(default)]
    pub init_from: Option<PathBuf>,
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_max_episode_steps() -> usize {
    200
}

fn default_init_std() -> f32 {
    0.01
}

fn default_momentum() -> f32 {
    0.9
}

fn default_beta1() -> f32 {
    0.9
}

fn default_beta2() -> f32 {
    0.999
}

fn default_epsilon() -> f32 {
    1e-8
}
