use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use crate::ConfigErr;

/// The result type used in the entire es core module.
pub type Result<T> = std::result::Result<T, EsErr>;

/// The es core module's error type.
#[derive(Debug)]
pub enum EsErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    NoiseOutOfBounds {
        index: usize,
        dim: usize,
        len: usize,
    },
    Config(ConfigErr),
    Io(io::Error),
    Snapshot(serde_json::Error),
}

impl Display for EsErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EsErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "size mismatch for {what}, got {got} and expected {expected}"
            ),
            EsErr::NoiseOutOfBounds { index, dim, len } => write!(
                f,
                "noise slice [{index}, {index} + {dim}) is out of bounds for a table of {len} values"
            ),
            EsErr::Config(e) => write!(f, "configuration error: {e}"),
            EsErr::Io(e) => write!(f, "io error: {e}"),
            EsErr::Snapshot(e) => write!(f, "malformed policy snapshot: {e}"),
        }
    }
}

impl Error for EsErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            EsErr::Config(e) => Some(e),
            EsErr::Io(e) => Some(e),
            EsErr::Snapshot(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigErr> for EsErr {
    fn from(value: ConfigErr) -> Self {
        Self::Config(value)
    }
}

impl From<io::Error> for EsErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for EsErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Snapshot(value)
    }
}

/// Fails with `EsErr::SizeMismatch` unless `got == expected`.
pub fn check_len(what: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(EsErr::SizeMismatch {
            what,
            got,
            expected,
        });
    }

    Ok(())
}
