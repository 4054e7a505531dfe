//! # cellgraph application library
//!
//! CLI and HTTP API of the cellgraph binary, exposed for integration tests.

pub mod api;
pub mod cli;
