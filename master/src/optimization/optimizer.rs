use es_core::EsErr;

use crate::Result;

/// Defines the strategy for moving the parameters given a step direction.
pub trait Optimizer: Send {
    /// Moves `params` against `grad`.
    ///
    /// # Arguments
    /// * `grad` - The step direction, the parameters move to decrease it.
    /// * `params` - The parameters to update.
    ///
    /// # Returns
    /// The update ratio `‖step‖ / ‖params‖`, measured before the update, or an
    /// error if there's a mismatch in the sizes of `grad`, `params` and the optimizer state.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<f32>;
}

pub(super) fn check_sizes(grad: &[f32], params: &[f32], state: usize) -> Result<()> {
    for (what, got) in [("gradient", grad.len()), ("parameters", params.len())] {
        if got != state {
            return Err(EsErr::SizeMismatch {
                what,
                got,
                expected: state,
            }
            .into());
        }
    }

    Ok(())
}

pub(super) fn norm(x: &[f32]) -> f32 {
    x.iter().map(|v| v * v).sum::<f32>().sqrt()
}
