//! CLI argument definitions using clap.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// modeld - camera synchronisation and model scheduling front end
#[derive(Parser, Debug)]
#[command(
    name = "modeld",
    author,
    version,
    about = "Driving-model front end: camera sync, temporal inputs, 20 Hz inference loop",
    long_about = "Synchronises the road and wide-road camera streams, maintains the desire \n\
                  and feature history buffers, applies calibration warps and drives the \n\
                  inference engine at the model frequency, publishing every evaluation \n\
                  to the configured sinks."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "MODELD_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "MODELD_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the model loop against the simulated camera backend
    Run(RunArgs),

    /// Validate configuration file without running
    Validate(ValidateArgs),

    /// Display configuration information
    Info(InfoArgs),
}

/// Arguments for the `run` command
#[derive(Parser, Debug, Clone)]
pub struct RunArgs {
    /// Path to configuration file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "MODELD_CONFIG")]
    pub config: Option<PathBuf>,

    /// Maximum number of loop iterations (0 = unlimited)
    #[arg(long, default_value = "0", env = "MODELD_MAX_CYCLES")]
    pub max_cycles: u64,

    /// Run timeout in seconds (0 = no timeout)
    #[arg(long, default_value = "0", env = "MODELD_TIMEOUT")]
    pub timeout: u64,

    /// Validate configuration and exit without running
    #[arg(long)]
    pub dry_run: bool,

    /// Capacity of the publish queue between the loop and the dispatcher
    #[arg(long, default_value = "100", env = "MODELD_BUFFER_SIZE")]
    pub buffer_size: usize,

    /// Metrics server port (0 = disabled)
    #[arg(long, default_value = "9000", env = "MODELD_METRICS_PORT")]
    pub metrics_port: u16,

    /// Only publish the wide road camera (single-camera mode)
    #[arg(long, conflicts_with = "road_only")]
    pub wide_only: bool,

    /// Only publish the road camera (single-camera mode)
    #[arg(long)]
    pub road_only: bool,

    /// Override the simulated frame drop probability
    #[arg(long, env = "MODELD_DROP_PROBABILITY")]
    pub drop_probability: Option<f64>,

    /// Override the simulation RNG seed
    #[arg(long, env = "MODELD_SEED")]
    pub seed: Option<u64>,

    /// Override the steady lateral-plan desire
    #[arg(long, allow_negative_numbers = true)]
    pub desire: Option<i32>,

    /// Right-hand drive traffic convention
    #[arg(long)]
    pub rhd: bool,

    /// Let the preprocessors write straight into engine-owned input slots
    #[arg(long)]
    pub device_buffers: bool,
}

/// Arguments for the `validate` command
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to configuration file to validate
    #[arg(short, long, default_value = "modeld.toml")]
    pub config: PathBuf,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Parser, Debug)]
pub struct InfoArgs {
    /// Path to configuration file
    #[arg(short, long, default_value = "modeld.toml")]
    pub config: PathBuf,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,

    /// Show the model input slot layout
    #[arg(long)]
    pub inputs: bool,

    /// Show sink configuration
    #[arg(long)]
    pub sinks: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}
