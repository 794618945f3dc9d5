use std::path::{Path, PathBuf};

use comms::specs::task::TaskId;
use es_core::policy::Policy;

use crate::{MasterErr, Result};

/// Names the snapshot of iteration `task_id` after its mean evaluation return.
///
/// The mean is truncated towards zero, without evaluations it reads `nan`.
pub fn snapshot_name(task_id: TaskId, eval_returns: &[f32]) -> String {
    let reward = if eval_returns.is_empty() {
        "nan".to_string()
    } else {
        let mean = eval_returns.iter().map(|&r| r as f64).sum::<f64>() / eval_returns.len() as f64;
        (mean.trunc() as i64).to_string()
    };

    format!("snapshot_iter{task_id:05}_rew{reward}.json")
}

/// Saves `policy` into `log_dir`, failing if the file already exists.
pub(crate) fn save_snapshot(
    log_dir: &Path,
    task_id: TaskId,
    eval_returns: &[f32],
    policy: &dyn Policy,
) -> Result<PathBuf> {
    let path = log_dir.join(snapshot_name(task_id, eval_returns));

    if path.exists() {
        return Err(MasterErr::SnapshotExists(path));
    }

    policy.save(&path)?;
    Ok(path)
}
