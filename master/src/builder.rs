use std::{fs, path::PathBuf, sync::Arc};

use comms::{relay::MasterClient, specs::experiment::ExperimentSpec};
use es_core::{ConfigErr, RunningStat, Setup, SharedNoiseTable};
use log::info;

use crate::{Master, Result, optimization::build_optimizer};

/// The count and per component sum of squares the master's observation statistics start from.
const OB_STAT_EPS: f64 = 1e-2;

/// Builds `Master`s given an experiment.
pub struct MasterBuilder {
    log_dir: PathBuf,
}

impl MasterBuilder {
    /// Creates a new `MasterBuilder`.
    ///
    /// # Arguments
    /// * `log_dir` - Where the masters it builds write their snapshots.
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        Self {
            log_dir: log_dir.into(),
        }
    }

    /// Sets up the experiment and declares it to the workers.
    ///
    /// # Arguments
    /// * `exp` - The experiment to run.
    /// * `noise` - The noise table generated from `exp.noise`.
    /// * `client` - The master's side of the relay.
    ///
    /// # Returns
    /// A master ready to run its first iteration, or an error if the
    /// experiment is invalid or the relay is unreachable.
    pub async fn build<C: MasterClient>(
        &self,
        exp: ExperimentSpec,
        noise: Arc<SharedNoiseTable>,
        mut client: C,
    ) -> Result<Master<C>> {
        let Setup {
            config,
            env,
            mut policy,
        } = Setup::from_spec(&exp)?;

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

        let optimizer = build_optimizer(&exp.optimizer, policy.num_params());
        let mut ob_stat = RunningStat::new(env.observation_dim(), OB_STAT_EPS);

        if let Some(path) = &exp.init_from {
            info!("Initializing weights from {}", path.display());
            policy.initialize_from(path, &mut ob_stat)?;
        }

        fs::create_dir_all(&self.log_dir)?;
        client.declare_experiment(exp).await?;
        info!(num_params = policy.num_params(); "declared experiment");

        Ok(Master::new(
            client,
            config,
            noise,
            policy,
            optimizer,
            ob_stat,
            self.log_dir.clone(),
        ))
    }
}
