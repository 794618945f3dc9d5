//! Transforms raw antithetic returns into the weights of the gradient estimate.

use crate::ReturnProcMode;

/// Ranks `x` in `[0, len)`, ties are broken by position.
pub fn compute_ranks(x: &[f32]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..x.len()).collect();
    order.sort_by(|&a, &b| x[a].total_cmp(&x[b]));

    let mut ranks = vec![0; x.len()];
    for (rank, i) in order.into_iter().enumerate() {
        ranks[i] = rank;
    }

    ranks
}

/// Ranks every return across all pairs and maps the ranks linearly onto `[-0.5, 0.5]`.
pub fn compute_centered_ranks(x: &[[f32; 2]]) -> Vec<[f32; 2]> {
    let flat = x.as_flattened();
    if flat.len() < 2 {
        return vec![[0.0; 2]; x.len()];
    }

    let denom = (flat.len() - 1) as f32;
    compute_ranks(flat)
        .chunks_exact(2)
        .map(|pair| [pair[0] as f32 / denom - 0.5, pair[1] as f32 / denom - 0.5])
        .collect()
}

/// Applies `mode` to this iteration's returns.
///
/// # Arguments
/// * `mode` - The return processing mode.
/// * `returns` - Total reward of each rollout, one pair per noise index.
/// * `sign_returns` - Sum of the reward signs of each rollout, one pair per noise index.
///
/// # Returns
/// The processed returns, one pair per noise index.
pub fn process_returns(
    mode: ReturnProcMode,
    returns: &[[f32; 2]],
    sign_returns: &[[f32; 2]],
) -> Vec<[f32; 2]> {
    match mode {
        ReturnProcMode::CenteredRank => compute_centered_ranks(returns),
        ReturnProcMode::Sign => sign_returns.to_vec(),
        ReturnProcMode::CenteredSignRank => compute_centered_ranks(sign_returns),
    }
}
