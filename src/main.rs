//! neumusic - a player core for NetEase-compatible music APIs.
//!
//! Two state containers do the work: the playback engine (playlist, shuffle,
//! history, stream URL resolution) and the session reconciler (login, restore,
//! periodic re-verification). The CLI drives both.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod model;
pub mod player;
pub mod scheduler;
pub mod session;
pub mod storage;
#[cfg(test)]
pub mod test_utils;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive("neumusic=info".parse()?))
        .init();

    cli::run_command(&args)
}
