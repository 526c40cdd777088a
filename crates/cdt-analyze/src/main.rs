use std::error::Error;

use clap::{Parser, Subcommand};
use commands::{
    profile::{self, ProfileArgs},
    slices::{self, SlicesArgs},
    tcor::{self, TcorArgs},
    teq::{self, TeqArgs},
};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "cdt-analyze", about = "Post-processing of CDT Monte Carlo runs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fit equilibration times and batch them over repeated runs per system size.
    Teq(TeqArgs),
    /// Estimate Monte Carlo correlation times of the slice-length width.
    Tcor(TcorArgs),
    /// Measure the slice-length width, the cosmological constant and their scaling.
    Profile(ProfileArgs),
    /// Slice-to-slice autocorrelation and batched covariance profiles.
    Slices(SlicesArgs),
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    match cli.command {
        Command::Teq(args) => teq::run(&args),
        Command::Tcor(args) => tcor::run(&args),
        Command::Profile(args) => profile::run(&args),
        Command::Slices(args) => slices::run(&args),
    }
}
