use rand::{Rng, RngCore};

use super::{Environment, Step};
use crate::{Result, error::check_len};

const SPEED: f32 = 0.1;
const GOAL_RADIUS: f32 = 0.05;

/// A point in `[-1, 1]^dim` that has to be driven to the origin.
///
/// Actions are clipped to `[-1, 1]` and move the point by a tenth of their
/// value. The reward is the negative distance to the origin.
pub struct PointMass {
    pos: Vec<f32>,
    max_episode_steps: usize,
}

impl PointMass {
    /// Creates a new `PointMass`, resting at the origin until reset.
    pub fn new(dim: usize, max_episode_steps: usize) -> Self {
        Self {
            pos: vec![0.0; dim],
            max_episode_steps,
        }
    }

    fn distance(&self) -> f32 {
        self.pos.iter().map(|x| x * x).sum::<f32>().sqrt()
    }
}

impl Environment for PointMass {
    fn observation_dim(&self) -> usize {
        self.pos.len()
    }

    fn action_dim(&self) -> usize {
        self.pos.len()
    }

    fn max_episode_steps(&self) -> usize {
        self.max_episode_steps
    }

    fn reset(&mut self, rng: &mut dyn RngCore) -> Vec<f32> {
        self.pos.iter_mut().for_each(|x| *x = rng.random_range(-1.0..=1.0));
        self.pos.clone()
    }

    fn step(&mut self, action: &[f32]) -> Result<Step> {
        check_len("action", action.len(), self.pos.len())?;

        for (x, a) in self.pos.iter_mut().zip(action) {
            *x = (*x + SPEED * a.clamp(-1.0, 1.0)).clamp(-1.0, 1.0);
        }

        let distance = self.distance();
        Ok(Step {
            observation: self.pos.clone(),
            reward: -distance,
            done: distance < GOAL_RADIUS,
        })
    }
}
