use std::{error::Error, fmt, io};

use es_core::{ConfigErr, EsErr};

/// The worker module's result type.
pub type Result<T> = std::result::Result<T, WorkerErr>;

/// Worker runtime failures.
#[derive(Debug)]
pub enum WorkerErr {
    Io(io::Error),
    Es(EsErr),
}

impl fmt::Display for WorkerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerErr::Io(e) => write!(f, "io error: {e}"),
            WorkerErr::Es(e) => write!(f, "{e}"),
        }
    }
}

impl Error for WorkerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            WorkerErr::Io(e) => Some(e),
            WorkerErr::Es(e) => Some(e),
        }
    }
}

impl From<io::Error> for WorkerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<EsErr> for WorkerErr {
    fn from(value: EsErr) -> Self {
        Self::Es(value)
    }
}

impl From<ConfigErr> for WorkerErr {
    fn from(value: ConfigErr) -> Self {
        Self::Es(EsErr::Config(value))
    }
}

/// Boundary conversion for binaries and I/O APIs.
impl From<WorkerErr> for io::Error {
    fn from(value: WorkerErr) -> Self {
        match value {
            WorkerErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
