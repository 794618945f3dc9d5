use std::{
    error::Error,
    fmt::{self, Display},
    io,
    path::PathBuf,
};

use comms::specs::{result::ShapeErr, task::TaskId};
use es_core::{ConfigErr, EsErr};

/// The result type used in the entire master module.
pub type Result<T> = std::result::Result<T, MasterErr>;

/// The master's error type, every variant ends the run.
#[derive(Debug)]
pub enum MasterErr {
    Io(io::Error),
    Es(EsErr),
    MalformedResult {
        task_id: TaskId,
        worker_id: u32,
        source: ShapeErr,
    },
    CountMismatch {
        processed: usize,
        expected: usize,
    },
    SnapshotExists(PathBuf),
}

impl Display for MasterErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MasterErr::Io(e) => write!(f, "io error: {e}"),
            MasterErr::Es(e) => write!(f, "{e}"),
            MasterErr::MalformedResult {
                task_id,
                worker_id,
                source,
            } => write!(
                f,
                "worker {worker_id} sent a malformed result for task {task_id}: {source}"
            ),
            MasterErr::CountMismatch {
                processed,
                expected,
            } => write!(
                f,
                "the gradient summed {processed} noise vectors, expected {expected}"
            ),
            MasterErr::SnapshotExists(path) => {
                write!(f, "refusing to overwrite snapshot {}", path.display())
            }
        }
    }
}

impl Error for MasterErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MasterErr::Io(e) => Some(e),
            MasterErr::Es(e) => Some(e),
            MasterErr::MalformedResult { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for MasterErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EsErr> for MasterErr {
    fn from(value: EsErr) -> Self {
        Self::Es(value)
    }
}

impl From<ConfigErr> for MasterErr {
    fn from(value: ConfigErr) -> Self {
        Self::Es(EsErr::Config(value))
    }
}
