mod point_mass;

use comms::specs::experiment::EnvSpec;
use rand::RngCore;

pub use point_mass::PointMass;

use crate::{ConfigErr, Result};

/// The outcome of a single environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    pub observation: Vec<f32>,
    pub reward: f32,
    pub done: bool,
}

/// An episodic environment a policy is rolled out in.
pub trait Environment: Send {
    fn observation_dim(&self) -> usize;

    fn action_dim(&self) -> usize;

    /// The episode length the environment enforces on its own.
    fn max_episode_steps(&self) -> usize;

    /// Starts a new episode.
    ///
    /// # Returns
    /// The first observation.
    fn reset(&mut self, rng: &mut dyn RngCore) -> Vec<f32>;

    /// Advances the episode by one action.
    ///
    /// # Returns
    /// The step or an error if `action` doesn't have `action_dim` components.
    fn step(&mut self, action: &[f32]) -> Result<Step>;
}

/// Builds the environment described by `spec`.
pub fn build_env(spec: &EnvSpec) -> Result<Box<dyn Environment>> {
    match *spec {
        EnvSpec::PointMass {
            dim,
            max_episode_steps,
        } => {
            if dim == 0 {
                return Err(ConfigErr::InvalidArg {
                    name: "point_mass.dim",
                    reason: "must be at least 1".to_string(),
                }
                .into());
            }

            Ok(Box::new(PointMass::new(dim, max_episode_steps)))
        }
    }
}
