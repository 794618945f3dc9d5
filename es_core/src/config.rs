use std::{
    error::Error,
    fmt::{self, Display},
    str::FromStr,
};

use comms::specs::experiment::ConfigSpec;

/// The ways raw returns are turned into gradient weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnProcMode {
    CenteredRank,
    Sign,
    CenteredSignRank,
}

/// How the episode length of noise rollouts is capped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EpisodeCutoff {
    /// Only the environment's own limit applies.
    EnvDefault,
    /// Starts at `start` and is multiplied by `ratio` whenever at least
    /// `threshold` of an iteration's episodes hit the limit.
    Adaptive {
        start: usize,
        threshold: f32,
        ratio: f32,
    },
}

/// The validated hyper-parameters of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub l2coeff: f32,
    pub noise_stdev: f32,
    pub episodes_per_batch: usize,
    pub timesteps_per_batch: usize,
    pub calc_obstat_prob: f32,
    pub eval_prob: f32,
    pub snapshot_freq: usize,
    pub return_proc_mode: ReturnProcMode,
    pub episode_cutoff: EpisodeCutoff,
}

/// The error for an experiment that can't be run.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigErr {
    UnknownReturnProcMode(String),
    UnknownEpisodeCutoffMode(String),
    ProbabilityOutOfRange { name: &'static str, value: f32 },
    NoEpisodesPerBatch,
    ObStatMismatch { needs_ob_stat: bool, calc_obstat_prob: f32 },
    InvalidArg { name: &'static str, reason: String },
}

impl Display for ConfigErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigErr::UnknownReturnProcMode(mode) => {
                write!(f, "unknown return processing mode {mode:?}")
            }
            ConfigErr::UnknownEpisodeCutoffMode(mode) => write!(
                f,
                "unknown episode cutoff mode {mode:?}, expected \"env_default\" or \"adaptive:<start>,<threshold>,<ratio>\""
            ),
            ConfigErr::ProbabilityOutOfRange { name, value } => {
                write!(f, "{name} must be within [0, 1], got {value}")
            }
            ConfigErr::NoEpisodesPerBatch => write!(f, "episodes_per_batch must be at least 1"),
            ConfigErr::ObStatMismatch {
                needs_ob_stat,
                calc_obstat_prob,
            } => write!(
                f,
                "the policy {} observation statistics but calc_obstat_prob is {calc_obstat_prob}",
                if *needs_ob_stat { "needs" } else { "doesn't need" }
            ),
            ConfigErr::InvalidArg { name, reason } => write!(f, "invalid {name}: {reason}"),
        }
    }
}

impl Error for ConfigErr {}

impl FromStr for ReturnProcMode {
    type Err = ConfigErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "centered_rank" => Ok(Self::CenteredRank),
            "sign" => Ok(Self::Sign),
            "centered_sign_rank" => Ok(Self::CenteredSignRank),
            _ => Err(ConfigErr::UnknownReturnProcMode(s.to_string())),
        }
    }
}

impl FromStr for EpisodeCutoff {
    type Err = ConfigErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "env_default" {
            return Ok(Self::EnvDefault);
        }

        let unknown = || ConfigErr::UnknownEpisodeCutoffMode(s.to_string());
        let args: Vec<_> = s.strip_prefix("adaptive:").ok_or_else(unknown)?.split(',').collect();

        let [start, threshold, ratio] = args.as_slice() else {
            return Err(unknown());
        };

        let cutoff = Self::Adaptive {
            start: start.trim().parse().map_err(|_| unknown())?,
            threshold: threshold.trim().parse().map_err(|_| unknown())?,
            ratio: ratio.trim().parse().map_err(|_| unknown())?,
        };

        Ok(cutoff)
    }
}

fn probability(name: &'static str, value: f32) -> Result<f32, ConfigErr> {
    if !(0.0..=1.0).contains(&value) {
        return Err(ConfigErr::ProbabilityOutOfRange { name, value });
    }

    Ok(value)
}

impl TryFrom<&ConfigSpec> for Config {
    type Error = ConfigErr;

    fn try_from(spec: &ConfigSpec) -> Result<Self, Self::Error> {
        if spec.episodes_per_batch == 0 {
            return Err(ConfigErr::NoEpisodesPerBatch);
        }

        Ok(Self {
            l2coeff: spec.l2coeff,
            noise_stdev: spec.noise_stdev,
            episodes_per_batch: spec.episodes_per_batch,
            timesteps_per_batch: spec.timesteps_per_batch,
            calc_obstat_prob: probability("calc_obstat_prob", spec.calc_obstat_prob)?,
            eval_prob: probability("eval_prob", spec.eval_prob)?,
            snapshot_freq: spec.snapshot_freq,
            return_proc_mode: spec.return_proc_mode.parse()?,
            episode_cutoff: spec.episode_cutoff_mode.parse()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> ConfigSpec {
        ConfigSpec {
            l2coeff: 0.005,
            noise_stdev: 0.02,
            episodes_per_batch: 10,
            timesteps_per_batch: 100,
            calc_obstat_prob: 0.01,
            eval_prob: 0.03,
            snapshot_freq: 20,
            return_proc_mode: "centered_rank".to_string(),
            episode_cutoff_mode: "adaptive:100,0.5,2".to_string(),
        }
    }

    #[test]
    fn valid_spec_is_accepted() {
        let config = Config::try_from(&spec()).unwrap();

        assert_eq!(config.return_proc_mode, ReturnProcMode::CenteredRank);
        assert_eq!(
            config.episode_cutoff,
            EpisodeCutoff::Adaptive {
                start: 100,
                threshold: 0.5,
                ratio: 2.0
            }
        );
    }

    #[test]
    fn every_return_mode_parses() {
        assert_eq!("sign".parse(), Ok(ReturnProcMode::Sign));
        assert_eq!(
            "centered_sign_rank".parse(),
            Ok(ReturnProcMode::CenteredSignRank)
        );
        assert!("rank".parse::<ReturnProcMode>().is_err());
    }

    #[test]
    fn malformed_cutoff_modes_are_rejected() {
        assert_eq!("env_default".parse(), Ok(EpisodeCutoff::EnvDefault));

        for mode in ["adaptive:100,0.5", "adaptive:a,0.5,2", "adaptive", "fixed:10", ""] {
            assert_eq!(
                mode.parse::<EpisodeCutoff>(),
                Err(ConfigErr::UnknownEpisodeCutoffMode(mode.to_string()))
            );
        }
    }

    #[test]
    fn probabilities_must_be_in_unit_range() {
        let mut bad = spec();
        bad.eval_prob = 1.5;

        assert_eq!(
            Config::try_from(&bad),
            Err(ConfigErr::ProbabilityOutOfRange {
                name: "eval_prob",
                value: 1.5
            })
        );
    }

    #[test]
    fn empty_batches_are_rejected() {
        let mut bad = spec();
        bad.episodes_per_batch = 0;

        assert_eq!(Config::try_from(&bad), Err(ConfigErr::NoEpisodesPerBatch));
    }
}
