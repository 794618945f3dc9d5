pub mod experiment;
pub mod result;
pub mod task;
