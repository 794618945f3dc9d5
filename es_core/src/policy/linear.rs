use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::{Rng, RngCore};
use rand_distr::{Normal, StandardNormal};

use super::{Policy, Rollout};
use crate::{ConfigErr, Result, env::Environment, error::check_len};

/// Normalized observations are clipped to this magnitude.
const OB_CLIP: f32 = 5.0;

/// A single affine layer squashed with `tanh`.
///
/// The flat parameters are the row major `action_dim x observation_dim`
/// weight matrix followed by the `action_dim` biases.
pub struct LinearPolicy {
    ob_dim: usize,
    ac_dim: usize,
    params: Vec<f32>,
    ac_noise_std: f32,
    needs_ob_stat: bool,
    ob_mean: Vec<f32>,
    ob_std: Vec<f32>,
}

impl LinearPolicy {
    /// Creates a new `LinearPolicy`.
    ///
    /// # Arguments
    /// * `ob_dim` - The observation size.
    /// * `ac_dim` - The action size.
    /// * `ac_noise_std` - Standard deviation of the gaussian noise added to every action.
    /// * `init_std` - Standard deviation of the initial parameters.
    /// * `needs_ob_stat` - Whether observations are normalized before use.
    /// * `rng` - The randomness source of the initial parameters.
    ///
    /// # Returns
    /// The policy or an error if a standard deviation is negative or not finite.
    pub fn new<R: Rng + ?Sized>(
        ob_dim: usize,
        ac_dim: usize,
        ac_noise_std: f32,
        init_std: f32,
        needs_ob_stat: bool,
        rng: &mut R,
    ) -> Result<Self> {
        if !ac_noise_std.is_finite() || ac_noise_std < 0.0 {
            return Err(ConfigErr::InvalidArg {
                name: "linear.ac_noise_std",
                reason: format!("{ac_noise_std} is not a valid standard deviation"),
            }
            .into());
        }

        let init = Normal::new(0.0, init_std).map_err(|e| ConfigErr::InvalidArg {
            name: "linear.init_std",
            reason: e.to_string(),
        })?;

        let size = (ob_dim + 1) * ac_dim;
        let params = rng.sample_iter(init).take(size).collect();

        Ok(Self {
            ob_dim,
            ac_dim,
            params,
            ac_noise_std,
            needs_ob_stat,
            ob_mean: vec![0.0; ob_dim],
            ob_std: vec![1.0; ob_dim],
        })
    }

    /// Gives a view of the flat parameters as the weights and biases of the layer.
    fn view_params(&self) -> Result<(ArrayView2<'_, f32>, ArrayView1<'_, f32>)> {
        let w_size = self.ob_dim * self.ac_dim;
        let (w, b) = self.params.split_at(w_size);
        let w = ArrayView2::from_shape((self.ac_dim, self.ob_dim), w).map_err(|_| {
            crate::EsErr::SizeMismatch {
                what: "policy weights",
                got: w.len(),
                expected: w_size,
            }
        })?;

        Ok((w, ArrayView1::from(b)))
    }

    /// Computes the action for `ob`.
    pub fn act(&self, ob: &[f32], rng: &mut dyn RngCore) -> Result<Vec<f32>> {
        check_len("observation", ob.len(), self.ob_dim)?;

        let ob: Array1<f32> = if self.needs_ob_stat {
            ob.iter()
                .zip(&self.ob_mean)
                .zip(&self.ob_std)
                .map(|((o, m), s)| ((o - m) / s).clamp(-OB_CLIP, OB_CLIP))
                .collect()
        } else {
            ob.iter().copied().collect()
        };

        let (w, b) = self.view_params()?;
        let mut action = w.dot(&ob) + &b;
        action.mapv_inplace(f32::tanh);

        if self.ac_noise_std != 0.0 {
            for a in action.iter_mut() {
                let noise: f32 = rng.sample(StandardNormal);
                *a += self.ac_noise_std * noise;
            }
        }

        Ok(action.to_vec())
    }
}

impl Policy for LinearPolicy {
    fn num_params(&self) -> usize {
        self.params.len()
    }

    fn trainable_flat(&self) -> &[f32] {
        &self.params
    }

    fn set_trainable_flat(&mut self, params: &[f32]) -> Result<()> {
        check_len("policy parameters", params.len(), self.params.len())?;
        self.params.copy_from_slice(params);
        Ok(())
    }

    fn needs_ob_stat(&self) -> bool {
        self.needs_ob_stat
    }

    fn set_ob_stat(&mut self, mean: &[f32], std: &[f32]) -> Result<()> {
        check_len("ob mean", mean.len(), self.ob_dim)?;
        check_len("ob std", std.len(), self.ob_dim)?;

        self.ob_mean.copy_from_slice(mean);
        self.ob_std.copy_from_slice(std);
        Ok(())
    }

    fn ob_stat(&self) -> Option<(&[f32], &[f32])> {
        self.needs_ob_stat
            .then_some((self.ob_mean.as_slice(), self.ob_std.as_slice()))
    }

    fn rollout(
        &mut self,
        env: &mut dyn Environment,
        timestep_limit: Option<usize>,
        save_obs: bool,
        rng: &mut dyn RngCore,
    ) -> Result<Rollout> {
        let env_limit = env.max_episode_steps();
        let limit = timestep_limit.map_or(env_limit, |limit| limit.min(env_limit));

        let mut rewards = Vec::new();
        let mut obs = save_obs.then(Vec::new);
        let mut ob = env.reset(rng);

        for _ in 0..limit {
            if let Some(obs) = &mut obs {
                obs.extend_from_slice(&ob);
            }

            let action = self.act(&ob, rng)?;
            let step = env.step(&action)?;
            rewards.push(step.reward);
            ob = step.observation;

            if step.done {
                break;
            }
        }

        let obs = match obs {
            Some(obs) => {
                let got = obs.len();
                let obs = Array2::from_shape_vec((rewards.len(), self.ob_dim), obs).map_err(|_| {
                    crate::EsErr::SizeMismatch {
                        what: "saved observations",
                        got,
                        expected: rewards.len() * self.ob_dim,
                    }
                })?;
                Some(obs)
            }
            None => None,
        };

        Ok(Rollout { rewards, obs })
    }
}
