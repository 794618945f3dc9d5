mod server;

pub use server::{RelayServer, serve};
