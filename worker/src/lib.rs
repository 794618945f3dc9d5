mod config;
mod error;
pub mod net;
mod worker;

pub use config::WorkerConfig;
pub use error::{Result, WorkerErr};
pub use net::RelayClient;
pub use worker::Worker;
