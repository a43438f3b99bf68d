//! Command-line interface for neumusic.
//!
//! Login and session management, catalog lookups and a headless player
//! whose queue and history persist between invocations.

mod commands;

pub use commands::{App, Cli, Commands, run_command};
