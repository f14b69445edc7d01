//! `cdpmux` binary internals: argument parsing, configuration, logging and
//! the DevTools HTTP/WebSocket endpoint.

pub mod cli;
pub mod config;
pub mod domains;
pub mod logging;
pub mod server;
