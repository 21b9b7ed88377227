use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod cli;
mod config;
mod locate;
mod manifest;
mod matcher;
mod patch;
mod recommendation;
mod state;
mod surgery;
mod util;
mod workflow;

use cli::{Command, RootArgs};

fn main() -> Result<()> {
    let args = RootArgs::parse();
    init_tracing(args.verbose);

    match args.command {
        Command::Vm(args) => workflow::run_vm(args),
        Command::Iam(args) => workflow::run_iam(args),
        Command::Match(args) => workflow::run_match(args),
        Command::Config(args) => workflow::run_config(args),
    }
}

// stdout carries the JSON result, so logs go to stderr.
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
