pub mod config;
pub mod env;
pub mod error;
pub mod gradient;
pub mod noise;
pub mod policy;
pub mod returns;
mod setup;
pub mod stats;

pub use config::{Config, ConfigErr, EpisodeCutoff, ReturnProcMode};
pub use error::{EsErr, Result};
pub use noise::SharedNoiseTable;
pub use setup::Setup;
pub use stats::RunningStat;
