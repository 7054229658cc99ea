//! The command line interface of the tile estimator.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// area, latency and energy of one neuro-inspired compute tile
#[derive(Parser, Debug)]
#[command(author, about, version)]
pub struct Cli {
    /// subcommand
    #[clap(subcommand)]
    pub subcmd: Operation,
}

/// the subcommands of the estimator
#[derive(Debug, Subcommand)]
pub enum Operation {
    /// estimate area and performance of the configured workload
    Run(RunArgs),
    /// estimate the tile area only
    Area(AreaArgs),
    /// estimate several configurations in parallel and summarize them
    Sweep(SweepArgs),
}

/// the arguments of the run subcommand
#[derive(Debug, Args)]
pub struct RunArgs {
    /// the config file path
    pub config: PathBuf,
}

/// the arguments of the area subcommand
#[derive(Debug, Args)]
pub struct AreaArgs {
    /// the config file path
    pub config: PathBuf,
}

/// the arguments of the sweep subcommand
#[derive(Debug, Args)]
pub struct SweepArgs {
    /// the config file paths, one per configuration point
    #[clap(required = true)]
    pub configs: Vec<PathBuf>,
    /// where to write the sweep report
    #[clap(short, long, default_value = "output/sweep.json")]
    pub output: PathBuf,
}
