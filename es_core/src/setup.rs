use comms::specs::experiment::ExperimentSpec;
use log::debug;

use crate::{
    Config, ConfigErr, Result,
    env::{Environment, build_env},
    policy::{Policy, build_policy},
};

/// The pieces of a run both the master and the workers build from an experiment.
pub struct Setup {
    pub config: Config,
    pub env: Box<dyn Environment>,
    pub policy: Box<dyn Policy>,
}

impl Setup {
    /// Validates `exp` and builds its environment and policy.
    ///
    /// # Returns
    /// The setup or an error if the experiment can't be run.
    pub fn from_spec(exp: &ExperimentSpec) -> Result<Self> {
        let config = Config::try_from(&exp.config)?;
        let env = build_env(&exp.env)?;
        let policy = build_policy(&exp.policy, env.as_ref(), exp.seed)?;

        let needs_ob_stat = policy.needs_ob_stat();
        if needs_ob_stat != (config.calc_obstat_prob != 0.0) {
            return Err(ConfigErr::ObStatMismatch {
                needs_ob_stat,
                calc_obstat_prob: config.calc_obstat_prob,
            }
            .into());
        }

        debug!(
            num_params = policy.num_params(),
            ob_dim = env.observation_dim(),
            ac_dim = env.action_dim();
            "experiment set up"
        );

        Ok(Self {
            config,
            env,
            policy,
        })
    }
}
