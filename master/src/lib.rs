mod builder;
mod error;
mod limit;
mod master;
pub mod metrics;
pub mod optimization;
pub mod service;
mod snapshot;
mod test;

pub use builder::MasterBuilder;
pub use error::{MasterErr, Result};
pub use limit::TimestepLimit;
pub use master::Master;
pub use snapshot::snapshot_name;
