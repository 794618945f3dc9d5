mod adam;
mod optimizer;
mod sgd;

use comms::specs::experiment::OptimizerSpec;

pub use adam::Adam;
pub use optimizer::Optimizer;
pub use sgd::Sgd;

/// Builds the optimizer described by `spec`.
///
/// # Arguments
/// * `spec` - The optimizer specification.
/// * `len` - The amount of parameters it will update.
pub fn build_optimizer(spec: &OptimizerSpec, len: usize) -> Box<dyn Optimizer> {
    match *spec {
        OptimizerSpec::Sgd { stepsize, momentum } => Box::new(Sgd::new(len, stepsize, momentum)),
        OptimizerSpec::Adam {
            stepsize,
            beta1,
            beta2,
            epsilon,
        } => Box::new(Adam::new(len, stepsize, beta1, beta2, epsilon)),
    }
}
