use std::{
    fs::{File, OpenOptions},
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use comms::specs::task::ObNorm;
use serde::{Deserialize, Serialize};

use super::Policy;
use crate::Result;

/// The sample count a loaded snapshot's observation statistics are weighted with.
pub const INIT_OB_COUNT: f64 = 1e5;

/// The on disk form of a policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySnapshot {
    pub params: Vec<f32>,
    pub ob_stat: Option<ObNorm>,
}

impl PolicySnapshot {
    pub fn of<P: Policy + ?Sized>(policy: &P) -> Self {
        Self {
            params: policy.trainable_flat().to_vec(),
            ob_stat: policy.ob_stat().map(|(mean, std)| ObNorm {
                mean: mean.to_vec(),
                std: std.to_vec(),
            }),
        }
    }

    /// Writes the snapshot as json, failing if `path` already exists.
    pub fn write_new(&self, path: &Path) -> Result<()> {
        let file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn read(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        Ok(serde_json::from_reader(reader)?)
    }
}
