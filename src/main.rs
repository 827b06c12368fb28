use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

mod config;
mod convert;
mod laps;
mod store;
mod track;

#[derive(Debug, Parser)]
struct Cli {
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Convert the GPS track log into a polyline shapefile
    Convert,
    /// Parse the track log and report the laps without writing anything
    Check,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let path = match cli.config.as_deref() {
        Some(x) => x,
        None => Path::new("config.toml"),
    };
    let config = config::load(path)?;

    match cli.command {
        Command::Convert => convert::run(&config)?,
        Command::Check => convert::check(&config)?,
    };

    Ok(())
}
