use std::io;

use anyhow::Context;
use clap::Parser;
use runner::{Cli, Runner};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

mod config;
mod gps_utils;
mod map_data;
mod osm_data;
mod partition;
mod result_reader;
mod result_writer;
mod runner;
#[cfg(test)]
mod test_utils;

fn init_logging(level: Level) -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_writer(io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_thread_names(true)
        .with_max_level(level)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level)?;
    Runner::new(cli).run()?;
    Ok(())
}
