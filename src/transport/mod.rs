//! Transport layer: the HTTP relay and command-line entry points

pub mod cli;
pub mod http;

pub use http::{create_router, run_http_server, serve, ApiError, AppState};
