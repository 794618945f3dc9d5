use serde::{Deserialize, Serialize};

/// Identifies the iteration a task belongs to, the first task has id 0.
pub type TaskId = u64;

/// Observation normalization statistics, always sent as a pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObNorm {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

/// The small, json encoded part of a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMeta {
    pub ob_stat: Option<ObNorm>,
    pub timestep_limit: Option<usize>,
}

/// A parameter snapshot workers evaluate perturbations of.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub params: Vec<f32>,
    pub meta: TaskMeta,
}
