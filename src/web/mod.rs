//! HTTP surface

pub mod server;

pub use server::{router, start_server, AppState};
