use std::{error::Error, fmt};

use serde::{Deserialize, Serialize};

/// Observation statistics gathered by a worker during one task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObStatDelta {
    pub sum: Vec<f32>,
    pub sumsq: Vec<f32>,
    pub count: f64,
}

/// The antithetic rollouts a worker ran for one task.
///
/// Entry `i` of every vector belongs to the noise vector at `noise_inds[i]`,
/// the first element of each pair is the positive perturbation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoiseOutcome {
    pub noise_inds: Vec<usize>,
    pub returns: Vec<[f32; 2]>,
    pub sign_returns: Vec<[f32; 2]>,
    pub lengths: Vec<[usize; 2]>,
    pub ob_stat: Option<ObStatDelta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Eval { eval_return: f32, eval_length: usize },
    Noise(NoiseOutcome),
}

/// A worker's contribution towards a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EsResult {
    pub worker_id: u32,
    pub outcome: Outcome,
}

/// A field of a received result whose length disagrees with the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeErr {
    pub what: &'static str,
    pub got: usize,
    pub expected: usize,
}

impl fmt::Display for ShapeErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "malformed result: {} has length {}, expected {}",
            self.what, self.got, self.expected
        )
    }
}

impl Error for ShapeErr {}

impl NoiseOutcome {
    /// The number of antithetic pairs in this outcome.
    pub fn len(&self) -> usize {
        self.noise_inds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.noise_inds.is_empty()
    }

    /// Checks that every per pair vector has one entry per noise index and
    /// that the observation statistics agree with each other and with `ob_dim`.
    pub fn check_shapes(&self, ob_dim: usize) -> Result<(), ShapeErr> {
        let expected = self.noise_inds.len();
        let lens = [
            ("returns", self.returns.len()),
            ("sign_returns", self.sign_returns.len()),
            ("lengths", self.lengths.len()),
        ];

        for (what, got) in lens {
            if got != expected {
                return Err(ShapeErr {
                    what,
                    got,
                    expected,
                });
            }
        }

        if let Some(ob_stat) = &self.ob_stat {
            for (what, got) in [("ob_sum", ob_stat.sum.len()), ("ob_sumsq", ob_stat.sumsq.len())] {
                if got != ob_dim {
                    return Err(ShapeErr {
                        what,
                        got,
                        expected: ob_dim,
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome() -> NoiseOutcome {
        NoiseOutcome {
            noise_inds: vec![3, 9],
            returns: vec![[1.0, -1.0], [0.5, 0.0]],
            sign_returns: vec![[4.0, -4.0], [1.0, 0.0]],
            lengths: vec![[4, 4], [2, 1]],
            ob_stat: None,
        }
    }

    #[test]
    fn consistent_outcome_passes() {
        assert_eq!(outcome().check_shapes(2), Ok(()));
    }

    #[test]
    fn mismatched_returns_are_reported() {
        let mut outcome = outcome();
        outcome.returns.pop();

        let err = outcome.check_shapes(2).unwrap_err();
        assert_eq!(err.what, "returns");
        assert_eq!((err.got, err.expected), (1, 2));
    }

    #[test]
    fn ob_stat_must_match_observation_dim() {
        let mut outcome = outcome();
        outcome.ob_stat = Some(ObStatDelta {
            sum: vec![0.0; 3],
            sumsq: vec![0.0; 2],
            count: 1.0,
        });

        let err = outcome.check_shapes(2).unwrap_err();
        assert_eq!(err.what, "ob_sum");
    }
}
