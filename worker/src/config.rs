use std::time::Duration;

/// Runtime knobs of a worker that are not part of the experiment.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    min_task_runtime: Duration,
    seed: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new(Duration::from_millis(200))
    }
}

impl WorkerConfig {
    /// Creates a new worker configuration.
    ///
    /// # Args
    /// * `min_task_runtime` - How long a worker keeps sampling perturbations of a task before reporting.
    ///
    /// # Returns
    /// A `WorkerConfig` instance.
    pub fn new(min_task_runtime: Duration) -> Self {
        Self {
            min_task_runtime,
            seed: None,
        }
    }

    /// Seeds the worker's randomness, which otherwise comes from the os.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn min_task_runtime(&self) -> Duration {
        self.min_task_runtime
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}
