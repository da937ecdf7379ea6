use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
pub struct CliOpt {
    /// Path to the JSON file containing the network graph
    #[arg(long)]
    pub network_graph: PathBuf,

    /// The random seed used for the simulated network (governing packet ids, packet values and
    /// traffic destinations)
    #[arg(long, default_value_t = 42)]
    pub network_rng_seed: u64,

    /// Whether the run should be non-deterministic, i.e. using a non-constant seed for the random
    /// number generators
    #[arg(long)]
    pub non_deterministic: bool,

    /// The highest value a packet can be assigned (values are drawn uniformly from 1 up to this)
    #[arg(long, default_value_t = 100)]
    pub max_ppv: u32,

    /// Path to a file where the JSON trace of the simulation will be written
    #[arg(long)]
    pub replay_log: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the routing tables computed for the network graph
    Routes,
    /// Run a scripted sequence of steps against the network
    Run(RunOpt),
    /// Run the built-in traffic generator
    Traffic(TrafficOpt),
}

#[derive(Parser, Debug, Clone)]
pub struct RunOpt {
    /// Path to the JSON file containing the steps to run
    #[arg(long)]
    pub script: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct TrafficOpt {
    /// The number of ticks to simulate
    ///
    /// In each tick hosts send, every pending packet is received and routers forward.
    #[arg(long, default_value_t = 10)]
    pub ticks: u64,
}
