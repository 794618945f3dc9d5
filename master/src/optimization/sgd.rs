use super::{
    Optimizer,
    optimizer::{check_sizes, norm},
};
use crate::Result;

/// Stochastic gradient descent with an exponentially averaged velocity.
#[derive(Debug)]
pub struct Sgd {
    stepsize: f32,
    momentum: f32,
    velocity: Box<[f32]>,
}

impl Sgd {
    /// Creates a new `Sgd` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `stepsize` - The small coefficient that modulates the amount of training per update.
    /// * `momentum` - How much of the previous velocity is kept on every update.
    ///
    /// # Returns
    /// A new `Sgd` instance.
    pub fn new(len: usize, stepsize: f32, momentum: f32) -> Self {
        Self {
            stepsize,
            momentum,
            velocity: vec![0.; len].into_boxed_slice(),
        }
    }
}

impl Optimizer for Sgd {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<f32> {
        check_sizes(grad, params, self.velocity.len())?;

        let lr = self.stepsize;
        let mu = self.momentum;
        let params_norm = norm(params);
        let mut step_sq = 0f32;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.velocity.iter_mut())
            .for_each(|((p, g), v)| {
                *v = mu * *v + (1. - mu) * g;
                let step = -lr * *v;
                step_sq += step * step;
                *p += step;
            });

        Ok(step_sq.sqrt() / params_norm)
    }
}
