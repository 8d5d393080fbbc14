//! `run` command implementation.

use anyhow::{Context, Result};
use contracts::ModeldConfig;
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Pipeline, PipelineConfig};

/// Execute the `run` command
pub async fn run_modeld(args: &RunArgs) -> Result<()> {
    let mut config = load_config(args)?;
    apply_overrides(&mut config, args);
    config_loader::ConfigLoader::validate(&config)
        .map_err(|e| CliError::config_validation(e.to_string()))?;

    info!(
        road = config.simulation.road,
        wide_road = config.simulation.wide_road,
        frequency_hz = config.simulation.frequency_hz,
        drop_probability = config.simulation.drop_probability,
        sinks = config.sinks.len(),
        "Configuration loaded"
    );

    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&config);
        return Ok(());
    }

    let pipeline = Pipeline::new(PipelineConfig {
        modeld: config,
        max_cycles: (args.max_cycles > 0).then_some(args.max_cycles),
        timeout: (args.timeout > 0).then(|| Duration::from_secs(args.timeout)),
        buffer_size: args.buffer_size,
        metrics_port: (args.metrics_port > 0).then_some(args.metrics_port),
        device_buffers: args.device_buffers,
    });

    info!("Starting model loop...");
    let stats = pipeline
        .run(shutdown_signal())
        .await
        .context("Model loop execution failed")?;

    info!(
        iterations = stats.iterations(),
        duration_secs = stats.duration.as_secs_f64(),
        hz = format!("{:.2}", stats.cycle_rate()),
        "Model loop finished"
    );
    stats.print_summary();

    Ok(())
}

fn load_config(args: &RunArgs) -> Result<ModeldConfig> {
    match &args.config {
        Some(path) => {
            info!(config = %path.display(), "Loading configuration");
            if !path.exists() {
                return Err(CliError::config_not_found(path.display().to_string()).into());
            }
            config_loader::ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))
        }
        None => {
            info!("No configuration file given, using defaults");
            Ok(ModeldConfig::default())
        }
    }
}

fn apply_overrides(config: &mut ModeldConfig, args: &RunArgs) {
    let sim = &mut config.simulation;
    if args.wide_only {
        info!("Overriding camera set from CLI: wide road only");
        sim.road = false;
        sim.wide_road = true;
    }
    if args.road_only {
        info!("Overriding camera set from CLI: road only");
        sim.road = true;
        sim.wide_road = false;
    }
    if let Some(p) = args.drop_probability {
        info!(drop_probability = p, "Overriding drop probability from CLI");
        sim.drop_probability = p;
    }
    if let Some(seed) = args.seed {
        sim.seed = Some(seed);
    }
    if let Some(desire) = args.desire {
        sim.desire = desire;
    }
    if args.rhd {
        sim.is_rhd = true;
    }
    if config.sinks.is_empty() {
        warn!("No sinks configured - model outputs will be dropped");
    }
}

/// Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

fn print_config_summary(config: &ModeldConfig) {
    let sim = &config.simulation;
    println!("\n=== Configuration Summary ===\n");
    println!("Cameras:");
    println!("  Road: {}", if sim.road { "enabled" } else { "disabled" });
    println!(
        "  Wide road: {}",
        if sim.wide_road { "enabled" } else { "disabled" }
    );
    println!(
        "  {}x{} @ {} Hz, drop probability {}",
        sim.width, sim.height, sim.frequency_hz, sim.drop_probability
    );

    println!("\nSync:");
    println!("  Lead threshold: {} ms", config.sync.lead_threshold_ns as f64 / 1e6);
    println!(
        "  Desync threshold: {} ms",
        config.sync.desync_threshold_ns as f64 / 1e6
    );

    println!("\nDrop filter:");
    println!("  Time constant: {} s", config.drop_filter.time_constant_s);
    println!("  Warm-up cycles: {}", config.drop_filter.warmup_cycles);

    if !config.sinks.is_empty() {
        println!("\nSinks ({}):", config.sinks.len());
        for sink in &config.sinks {
            println!("  - {} ({:?})", sink.name, sink.sink_type);
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use clap::Parser;

    fn run_args(argv: &[&str]) -> RunArgs {
        let mut full = vec!["modeld", "run"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Run(args) => args,
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_overrides_apply_to_simulation() {
        let args = run_args(&["--wide-only", "--drop-probability", "0.25", "--rhd"]);
        let mut config = ModeldConfig::default();
        apply_overrides(&mut config, &args);

        assert!(!config.simulation.road);
        assert!(config.simulation.wide_road);
        assert!((config.simulation.drop_probability - 0.25).abs() < 1e-12);
        assert!(config.simulation.is_rhd);
    }

    #[test]
    fn test_missing_config_file() {
        let args = run_args(&["--config", "/nonexistent/modeld.toml"]);
        let err = load_config(&args).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn test_defaults_without_config() {
        let args = run_args(&[]);
        let config = load_config(&args).unwrap();
        assert!(config.simulation.road && config.simulation.wide_road);
    }
}
