//! The task store and result queue connecting the master with its workers.

use std::{io, sync::Arc};

use tokio::sync::{mpsc, watch};

use crate::specs::{
    experiment::ExperimentSpec,
    result::EsResult,
    task::{Task, TaskId},
};

/// The master's side of the relay.
#[allow(unused)]
#[trait_variant::make(MasterClient: Send)]
pub trait MasterClientTemplate {
    /// Makes the experiment available to every current and future worker.
    ///
    /// # Arguments
    /// * `exp` - The experiment the workers will set themselves up from.
    async fn declare_experiment(&mut self, exp: ExperimentSpec) -> io::Result<()>;

    /// Replaces the current task.
    ///
    /// # Arguments
    /// * `task` - The new task.
    ///
    /// # Returns
    /// The id of the published task, one more than the previous one.
    async fn declare_task(&mut self, task: Task) -> io::Result<TaskId>;

    /// Waits for the next result pushed by any worker.
    ///
    /// # Returns
    /// The result along with the id of the task it was computed against.
    async fn pop_result(&mut self) -> io::Result<(TaskId, EsResult)>;
}

/// A worker's side of the relay.
#[allow(unused)]
#[trait_variant::make(WorkerClient: Send)]
pub trait WorkerClientTemplate {
    /// Waits until the master declared the experiment and returns it.
    async fn get_experiment(&mut self) -> io::Result<ExperimentSpec>;

    /// Returns the latest task, waiting only while no task was published yet.
    async fn get_current_task(&mut self) -> io::Result<(TaskId, Arc<Task>)>;

    /// Queues a result for the master.
    ///
    /// # Arguments
    /// * `task_id` - The id of the task the result was computed against.
    /// * `result` - The result itself.
    async fn push_result(&mut self, task_id: TaskId, result: EsResult) -> io::Result<()>;
}

type CurrentTask = Option<(TaskId, Arc<Task>)>;
type QueuedResult = (TaskId, EsResult);

fn relay_closed<T>(what: &str) -> io::Result<T> {
    Err(io::Error::new(
        io::ErrorKind::BrokenPipe,
        format!("the relay's {what} is gone"),
    ))
}

/// The in-process relay, owned by the master.
///
/// Holds only the latest task, readers always observe a whole task. Results
/// are kept in an unbounded first in first out queue.
pub struct RelayMaster {
    experiment: watch::Sender<Option<Arc<ExperimentSpec>>>,
    task: watch::Sender<CurrentTask>,
    results_tx: mpsc::UnboundedSender<QueuedResult>,
    results_rx: mpsc::UnboundedReceiver<QueuedResult>,
    next_id: TaskId,
}

/// A worker handle onto a `RelayMaster`, cheap to clone.
#[derive(Clone)]
pub struct RelayWorker {
    experiment: watch::Receiver<Option<Arc<ExperimentSpec>>>,
    task: watch::Receiver<CurrentTask>,
    results: mpsc::UnboundedSender<QueuedResult>,
}

/// Creates an empty in-process relay.
pub fn relay() -> RelayMaster {
    let (experiment, _) = watch::channel(None);
    let (task, _) = watch::channel(None);
    let (results_tx, results_rx) = mpsc::unbounded_channel();

    RelayMaster {
        experiment,
        task,
        results_tx,
        results_rx,
        next_id: 0,
    }
}

impl RelayMaster {
    /// Creates a new handle for a worker.
    pub fn worker(&self) -> RelayWorker {
        RelayWorker {
            experiment: self.experiment.subscribe(),
            task: self.task.subscribe(),
            results: self.results_tx.clone(),
        }
    }
}

impl MasterClient for RelayMaster {
    async fn declare_experiment(&mut self, exp: ExperimentSpec) -> io::Result<()> {
        self.experiment.send_replace(Some(Arc::new(exp)));
        Ok(())
    }

    async fn declare_task(&mut self, task: Task) -> io::Result<TaskId> {
        let id = self.next_id;
        self.next_id += 1;
        self.task.send_replace(Some((id, Arc::new(task))));
        Ok(id)
    }

    async fn pop_result(&mut self) -> io::Result<(TaskId, EsResult)> {
        match self.results_rx.recv().await {
            Some(result) => Ok(result),
            None => relay_closed("result queue"),
        }
    }
}

impl WorkerClient for RelayWorker {
    async fn get_experiment(&mut self) -> io::Result<ExperimentSpec> {
        let exp = match self.experiment.wait_for(Option::is_some).await {
            Ok(exp) => exp.clone(),
            Err(_) => return relay_closed("experiment"),
        };

        match exp {
            Some(exp) => Ok(ExperimentSpec::clone(&exp)),
            None => relay_closed("experiment"),
        }
    }

    async fn get_current_task(&mut self) -> io::Result<(TaskId, Arc<Task>)> {
        let current = match self.task.wait_for(Option::is_some).await {
            Ok(current) => current.clone(),
            Err(_) => return relay_closed("task store"),
        };

        match current {
            Some(current) => Ok(current),
            None => relay_closed("task store"),
        }
    }

    async fn push_result(&mut self, task_id: TaskId, result: EsResult) -> io::Result<()> {
        if self.results.send((task_id, result)).is_err() {
            return relay_closed("result queue");
        }

        Ok(())
    }
}
