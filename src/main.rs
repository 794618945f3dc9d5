use std::{env, fs, num::NonZeroUsize, path::Path, sync::Arc, thread};

use anyhow::{Context, Result, bail};
use comms::{
    relay::{WorkerClient, relay},
    specs::experiment::ExperimentSpec,
};
use es_core::SharedNoiseTable;
use log::{info, warn};
use master::{MasterBuilder, service::RelayServer};
use tokio::{signal, task::JoinSet};
use worker::{RelayClient, Worker, WorkerConfig};

const USAGE: &str = "usage:
    es-distributed master <listen-addr> <experiment.json> <log-dir>
    es-distributed worker <master-addr> [num-workers]
    es-distributed local <experiment.json> <log-dir> [num-workers]";

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    let run = async {
        match args.as_slice() {
            ["master", addr, exp, log_dir] => {
                run_master(addr, Path::new(exp), Path::new(log_dir)).await
            }
            ["worker", addr, rest @ ..] if rest.len() <= 1 => {
                run_workers(addr, num_workers(rest.first())?).await
            }
            ["local", exp, log_dir, rest @ ..] if rest.len() <= 1 => {
                run_local(Path::new(exp), Path::new(log_dir), num_workers(rest.first())?).await
            }
            _ => bail!("{USAGE}"),
        }
    };

    tokio::select! {
        result = run => result,
        _ = signal::ctrl_c() => {
            info!("interrupted, shutting down");
            Ok(())
        }
    }
}

/// Parses the amount of workers to run, defaulting to one per core.
fn num_workers(arg: Option<&&str>) -> Result<usize> {
    match arg {
        Some(arg) => {
            let n: NonZeroUsize = arg
                .parse()
                .with_context(|| format!("invalid amount of workers {arg:?}"))?;
            Ok(n.get())
        }
        None => Ok(thread::available_parallelism().map_or(1, NonZeroUsize::get)),
    }
}

fn read_experiment(path: &Path) -> Result<ExperimentSpec> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read experiment {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("invalid experiment {}", path.display()))
}

fn noise_table(exp: &ExperimentSpec) -> Arc<SharedNoiseTable> {
    let noise = tokio::task::block_in_place(|| SharedNoiseTable::new(exp.noise.seed, exp.noise.len));
    Arc::new(noise)
}

async fn run_master(addr: &str, exp: &Path, log_dir: &Path) -> Result<()> {
    let exp = read_experiment(exp)?;
    let noise = noise_table(&exp);

    let relay_master = relay();
    let server = RelayServer::bind(addr, relay_master.worker())
        .await
        .with_context(|| format!("failed to listen at {addr}"))?;
    let mut master = MasterBuilder::new(log_dir)
        .build(exp, noise, relay_master)
        .await?;

    tokio::select! {
        result = server.run() => result.context("relay server stopped"),
        result = master.run() => result.context("master stopped"),
    }
}

async fn run_workers(addr: &str, num_workers: usize) -> Result<()> {
    let connect = || async move {
        RelayClient::connect(addr)
            .await
            .with_context(|| format!("failed to connect to {addr}"))
    };

    let mut first = connect().await?;
    let exp = first.get_experiment().await?;
    info!("received experiment, starting {num_workers} workers");
    let noise = noise_table(&exp);

    let mut workers = JoinSet::new();
    let mut client = Some(first);
    for _ in 0..num_workers {
        let client = match client.take() {
            Some(client) => client,
            None => connect().await?,
        };

        let mut worker = Worker::new(client, &exp, noise.clone(), WorkerConfig::default())?;
        workers.spawn(async move { worker.run().await });
    }

    join_workers(workers).await
}

async fn run_local(exp: &Path, log_dir: &Path, num_workers: usize) -> Result<()> {
    let exp = read_experiment(exp)?;
    let noise = noise_table(&exp);
    let relay_master = relay();

    let mut workers = JoinSet::new();
    for _ in 0..num_workers {
        let relay_worker = relay_master.worker();
        let mut worker = Worker::new(relay_worker, &exp, noise.clone(), WorkerConfig::default())?;
        workers.spawn(async move { worker.run().await });
    }

    let mut master = MasterBuilder::new(log_dir)
        .build(exp, noise, relay_master)
        .await?;

    tokio::select! {
        result = master.run() => result.context("master stopped"),
        result = join_workers(workers) => result,
    }
}

async fn join_workers(mut workers: JoinSet<worker::Result<()>>) -> Result<()> {
    while let Some(joined) = workers.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("worker failed: {e}"),
            Err(e) => warn!("worker task failed: {e}"),
        }
    }

    bail!("every worker stopped")
}
