#![cfg(test)]

use std::{path::PathBuf, sync::Arc};

use comms::{
    relay::{RelayMaster, RelayWorker, WorkerClient, relay},
    specs::{
        experiment::{ConfigSpec, EnvSpec, ExperimentSpec, NoiseSpec, OptimizerSpec, PolicySpec},
        result::{EsResult, NoiseOutcome, ObStatDelta, Outcome},
    },
};
use es_core::SharedNoiseTable;

use crate::{Master, MasterBuilder, MasterErr};

const NOISE_LEN: usize = 1000;

fn experiment() -> ExperimentSpec {
    ExperimentSpec {
        config: ConfigSpec {
            l2coeff: 0.0,
            noise_stdev: 0.02,
            episodes_per_batch: 2,
            timesteps_per_batch: 0,
            calc_obstat_prob: 0.0,
            eval_prob: 0.0,
            snapshot_freq: 0,
            return_proc_mode: "centered_rank".to_string(),
            episode_cutoff_mode: "env_default".to_string(),
        },
        env: EnvSpec::PointMass {
            dim: 2,
            max_episode_steps: 20,
        },
        policy: PolicySpec::Linear {
            ac_noise_std: 0.0,
            init_std: 0.0,
            needs_ob_stat: false,
        },
        optimizer: OptimizerSpec::Sgd {
            stepsize: 1.0,
            momentum: 0.0,
        },
        noise: NoiseSpec {
            seed: 5,
            len: NOISE_LEN,
        },
        init_from: None,
        seed: Some(0),
    }
}

fn log_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("master-{}-{name}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

async fn start(
    exp: ExperimentSpec,
    name: &str,
) -> (Master<RelayMaster>, RelayWorker, Arc<SharedNoiseTable>) {
    let noise = Arc::new(SharedNoiseTable::new(exp.noise.seed, exp.noise.len));
    let master = relay();
    let worker = master.worker();
    let master = MasterBuilder::new(log_dir(name))
        .build(exp, noise.clone(), master)
        .await
        .unwrap();

    (master, worker, noise)
}

fn noise_result(worker_id: u32, noise_inds: Vec<usize>, lengths: Vec<[usize; 2]>) -> EsResult {
    let pairs = noise_inds.len();
    EsResult {
        worker_id,
        outcome: Outcome::Noise(NoiseOutcome {
            noise_inds,
            returns: (0..pairs).map(|i| [i as f32, -(i as f32)]).collect(),
            sign_returns: vec![[1.0, -1.0]; pairs],
            lengths,
            ob_stat: None,
        }),
    }
}

#[tokio::test]
async fn single_pair_moves_params_along_its_noise_vector() {
    let (mut master, mut worker, noise) = start(experiment(), "single_pair").await;
    let num_params = master.policy().num_params();

    let result = EsResult {
        worker_id: 1,
        outcome: Outcome::Noise(NoiseOutcome {
            noise_inds: vec![17],
            returns: vec![[1.0, -1.0]],
            sign_returns: vec![[1.0, -1.0]],
            lengths: vec![[3, 3]],
            ob_stat: None,
        }),
    };
    worker.push_result(0, result).await.unwrap();

    let stats = master.step().await.unwrap();
    let v = noise.get(17, num_params).unwrap();

    assert_eq!(stats.task_id, 0);
    for (p, x) in master.policy().trainable_flat().iter().zip(v) {
        assert!((p - 0.5 * x).abs() < 1e-6);
    }

    let grad_sq: f64 = v.iter().map(|&x| (0.5 * x as f64).powi(2)).sum();
    assert!((stats.grad_norm - grad_sq).abs() < 1e-6 * grad_sq.max(1.0));
}

#[tokio::test]
async fn stale_results_count_globally_but_not_towards_the_batch() {
    let mut exp = experiment();
    exp.config.episodes_per_batch = 4;
    let (mut master, mut worker, _) = start(exp, "stale_results").await;

    worker.push_result(99, noise_result(1, vec![1], vec![[5, 5]])).await.unwrap();
    let eval = EsResult {
        worker_id: 2,
        outcome: Outcome::Eval {
            eval_return: -4.0,
            eval_length: 7,
        },
    };
    worker.push_result(0, eval).await.unwrap();
    worker.push_result(0, noise_result(2, vec![2], vec![[2, 2]])).await.unwrap();
    worker.push_result(0, noise_result(3, vec![3], vec![[3, 3]])).await.unwrap();
    worker.push_result(0, noise_result(3, vec![4], vec![[9, 9]])).await.unwrap();

    let stats = master.step().await.unwrap();

    assert_eq!(stats.episodes_this_iter, 4);
    assert_eq!(stats.timesteps_this_iter, 10);
    assert_eq!(stats.episodes_so_far, 2 + 1 + 2 + 2);
    assert_eq!(stats.timesteps_so_far, 10 + 7 + 4 + 6);
    assert_eq!(stats.eval_ep_count, 1);
    assert_eq!(stats.eval_ep_rew_mean, -4.0);
    assert_eq!(stats.unique_workers, 3);
    assert!((stats.unique_workers_frac - 3.0 / 4.0).abs() < 1e-12);
    assert!((stats.results_skipped_frac - 1.0 / 3.0).abs() < 1e-12);
}

#[tokio::test]
async fn timestep_target_keeps_collecting() {
    let mut exp = experiment();
    exp.config.timesteps_per_batch = 10;
    let (mut master, mut worker, _) = start(exp, "timestep_target").await;

    worker.push_result(0, noise_result(1, vec![1], vec![[2, 2]])).await.unwrap();
    worker.push_result(0, noise_result(1, vec![2], vec![[3, 3]])).await.unwrap();

    let stats = master.step().await.unwrap();

    assert_eq!(stats.episodes_this_iter, 4);
    assert_eq!(stats.timesteps_this_iter, 10);
}

#[tokio::test]
async fn malformed_current_result_is_fatal() {
    let (mut master, mut worker, _) = start(experiment(), "malformed").await;

    let mut result = noise_result(1, vec![1, 2], vec![[2, 2], [2, 2]]);
    if let Outcome::Noise(outcome) = &mut result.outcome {
        outcome.lengths.pop();
    }
    worker.push_result(0, result).await.unwrap();

    let err = master.step().await.unwrap_err();
    assert!(matches!(err, MasterErr::MalformedResult { worker_id: 1, .. }));
}

#[tokio::test]
async fn malformed_stale_result_is_fatal() {
    let (mut master, mut worker, _) = start(experiment(), "malformed_stale").await;

    let mut stale = noise_result(4, vec![1, 2], vec![[2, 2], [2, 2]]);
    if let Outcome::Noise(outcome) = &mut stale.outcome {
        outcome.returns.pop();
        outcome.lengths.pop();
    }
    worker.push_result(42, stale).await.unwrap();
    worker.push_result(0, noise_result(1, vec![3], vec![[2, 2]])).await.unwrap();

    let err = master.step().await.unwrap_err();
    assert!(matches!(
        err,
        MasterErr::MalformedResult {
            task_id: 42,
            worker_id: 4,
            ..
        }
    ));
}

#[tokio::test]
async fn stale_evals_and_ob_stats_stay_out_of_the_iteration() {
    let mut exp = experiment();
    exp.config.calc_obstat_prob = 0.5;
    exp.policy = PolicySpec::Linear {
        ac_noise_std: 0.0,
        init_std: 0.0,
        needs_ob_stat: true,
    };
    let (mut master, mut worker, _) = start(exp, "stale_evals").await;
    let ob_count_before = master.ob_stat().count();

    let stale_eval = EsResult {
        worker_id: 1,
        outcome: Outcome::Eval {
            eval_return: 100.0,
            eval_length: 5,
        },
    };
    worker.push_result(7, stale_eval).await.unwrap();

    let mut stale_noise = noise_result(2, vec![1], vec![[3, 3]]);
    if let Outcome::Noise(outcome) = &mut stale_noise.outcome {
        outcome.ob_stat = Some(ObStatDelta {
            sum: vec![10.0, -10.0],
            sumsq: vec![20.0, 20.0],
            count: 10.0,
        });
    }
    worker.push_result(7, stale_noise).await.unwrap();

    let long_eval_length = u32::MAX as usize + 1;
    let eval = EsResult {
        worker_id: 3,
        outcome: Outcome::Eval {
            eval_return: -1.0,
            eval_length: long_eval_length,
        },
    };
    worker.push_result(0, eval).await.unwrap();
    worker.push_result(0, noise_result(4, vec![2], vec![[2, 2]])).await.unwrap();

    let stats = master.step().await.unwrap();

    assert_eq!(stats.eval_ep_count, 1);
    assert_eq!(stats.eval_ep_rew_mean, -1.0);
    assert_eq!(stats.eval_ep_len_mean, long_eval_length as f64);
    assert_eq!(stats.episodes_so_far, 1 + 2 + 1 + 2);
    assert_eq!(stats.timesteps_so_far, 5 + 6 + long_eval_length + 4);
    assert!((stats.results_skipped_frac - 0.5).abs() < 1e-12);
    assert_eq!(stats.ob_count, 0.0);
    assert_eq!(master.ob_stat().count(), ob_count_before);
}

#[tokio::test]
async fn adaptive_limit_is_published_and_grows() {
    let mut exp = experiment();
    exp.config.episode_cutoff_mode = "adaptive:3,0.5,2".to_string();
    let (mut master, mut worker, _) = start(exp, "adaptive_limit").await;

    worker.push_result(0, noise_result(1, vec![1], vec![[3, 3]])).await.unwrap();
    master.step().await.unwrap();

    let (id, task) = worker.get_current_task().await.unwrap();
    assert_eq!(id, 0);
    assert_eq!(task.meta.timestep_limit, Some(3));
    assert_eq!(task.meta.ob_stat, None);
    assert_eq!(master.timestep_limit(), Some(6));
}

#[tokio::test]
async fn worker_ob_stats_are_merged() {
    let mut exp = experiment();
    exp.config.calc_obstat_prob = 0.5;
    exp.policy = PolicySpec::Linear {
        ac_noise_std: 0.0,
        init_std: 0.0,
        needs_ob_stat: true,
    };
    let (mut master, mut worker, _) = start(exp, "ob_stats").await;

    let mut result = noise_result(1, vec![1], vec![[2, 2]]);
    if let Outcome::Noise(outcome) = &mut result.outcome {
        outcome.ob_stat = Some(ObStatDelta {
            sum: vec![10.0, -10.0],
            sumsq: vec![20.0, 20.0],
            count: 10.0,
        });
    }
    worker.push_result(0, result).await.unwrap();

    let stats = master.step().await.unwrap();
    let (_, task) = worker.get_current_task().await.unwrap();

    assert_eq!(stats.ob_count, 10.0);
    assert!((master.ob_stat().count() - 10.01).abs() < 1e-9);
    assert_eq!(task.meta.ob_stat.as_ref().unwrap().std, vec![1.0, 1.0]);
    assert!((master.policy().ob_stat().unwrap().0[0] - 10.0 / 10.01).abs() < 1e-5);
}

#[tokio::test]
async fn snapshots_are_never_overwritten() {
    let mut exp = experiment();
    exp.config.snapshot_freq = 1;
    let (mut master, mut worker, _) = start(exp, "snapshot_collision").await;

    let dir = log_dir("snapshot_collision");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("snapshot_iter00000_rewnan.json"), "{}").unwrap();

    worker.push_result(0, noise_result(1, vec![1], vec![[2, 2]])).await.unwrap();
    let err = master.step().await.unwrap_err();

    assert!(matches!(err, MasterErr::SnapshotExists(_)));
}

#[tokio::test]
async fn noise_table_must_fit_the_policy() {
    let mut exp = experiment();
    exp.noise.len = 3;

    let noise = Arc::new(SharedNoiseTable::new(exp.noise.seed, exp.noise.len));
    let result = MasterBuilder::new(log_dir("small_noise"))
        .build(exp, noise, relay())
        .await;

    assert!(result.is_err());
}
