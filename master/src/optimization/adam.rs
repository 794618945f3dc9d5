use super::{
    Optimizer,
    optimizer::{check_sizes, norm},
};
use crate::Result;

#[derive(Debug)]
pub struct Adam {
    stepsize: f32,
    beta1: f32,
    beta2: f32,
    beta1_t: f32,
    beta2_t: f32,
    m: Box<[f32]>,
    v: Box<[f32]>,
    epsilon: f32,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `stepsize` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(len: usize, stepsize: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            stepsize,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            m: vec![0.; len].into_boxed_slice(),
            v: vec![0.; len].into_boxed_slice(),
            epsilon,
        }
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<f32> {
        check_sizes(grad, params, self.m.len())?;

        let Self {
            stepsize: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let a = lr * (1. - self.beta2_t).sqrt() / (1. - self.beta1_t);
        let params_norm = norm(params);
        let mut step_sq = 0f32;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
            .for_each(|(((p, g), m), v)| {
                *m = b1 * *m + (1. - b1) * g;
                *v = b2 * *v + (1. - b2) * g * g;
                let step = -a * *m / (v.sqrt() + eps);
                step_sq += step * step;
                *p += step;
            });

        Ok(step_sq.sqrt() / params_norm)
    }
}
