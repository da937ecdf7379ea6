use crate::config::SimulationConfig;
use crate::config::cli::CliOpt;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod config;
mod simulation;
mod util;

fn main() -> anyhow::Result<()> {
    let options = CliOpt::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let config = SimulationConfig::load(&options.network_graph)?;
    simulation::run(&options, config)
}
