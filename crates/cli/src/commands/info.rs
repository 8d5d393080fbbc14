//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{ModelInput, ModeldConfig, MODEL_OUTPUT_SIZE};
use serde::Serialize;
use tracing::info;

use crate::cli::InfoArgs;

#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    streams: StreamsInfo,
    sync: SyncInfo,
    drop_filter: DropFilterInfo,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    inputs: Vec<InputInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sinks: Vec<SinkInfo>,
}

#[derive(Serialize)]
struct StreamsInfo {
    road: bool,
    wide_road: bool,
    width: u32,
    height: u32,
    frequency_hz: f64,
    retry_interval_ms: u64,
    receive_timeout_ms: u64,
}

#[derive(Serialize)]
struct SyncInfo {
    lead_threshold_ms: f64,
    desync_threshold_ms: f64,
}

#[derive(Serialize)]
struct DropFilterInfo {
    time_constant_s: f64,
    model_frequency_hz: f64,
    max_dropped_per_cycle: u32,
    warmup_cycles: u32,
}

#[derive(Serialize)]
struct InputInfo {
    name: &'static str,
    len: usize,
}

#[derive(Serialize)]
struct SinkInfo {
    name: String,
    sink_type: String,
    queue_capacity: usize,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let config = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    let info = build_config_info(&config, args);
    if args.json {
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&info);
    }

    Ok(())
}

fn build_config_info(config: &ModeldConfig, args: &InfoArgs) -> ConfigInfo {
    let sim = &config.simulation;
    ConfigInfo {
        version: format!("{:?}", config.version),
        streams: StreamsInfo {
            road: sim.road,
            wide_road: sim.wide_road,
            width: sim.width,
            height: sim.height,
            frequency_hz: sim.frequency_hz,
            retry_interval_ms: config.streams.retry_interval_ms,
            receive_timeout_ms: config.streams.receive_timeout_ms,
        },
        sync: SyncInfo {
            lead_threshold_ms: config.sync.lead_threshold_ns as f64 / 1e6,
            desync_threshold_ms: config.sync.desync_threshold_ns as f64 / 1e6,
        },
        drop_filter: DropFilterInfo {
            time_constant_s: config.drop_filter.time_constant_s,
            model_frequency_hz: config.drop_filter.model_frequency_hz,
            max_dropped_per_cycle: config.drop_filter.max_dropped_per_cycle,
            warmup_cycles: config.drop_filter.warmup_cycles,
        },
        inputs: if args.inputs {
            ModelInput::ALL
                .iter()
                .map(|input| InputInfo {
                    name: input.name(),
                    len: input.len(),
                })
                .collect()
        } else {
            Vec::new()
        },
        sinks: if args.sinks {
            config
                .sinks
                .iter()
                .map(|s| SinkInfo {
                    name: s.name.clone(),
                    sink_type: format!("{:?}", s.sink_type),
                    queue_capacity: s.queue_capacity,
                })
                .collect()
        } else {
            Vec::new()
        },
    }
}

fn print_config_info(info: &ConfigInfo) {
    println!("\n=== modeld Configuration ({}) ===\n", info.version);

    let s = &info.streams;
    println!("Streams:");
    println!("  Road: {}, wide road: {}", s.road, s.wide_road);
    println!("  {}x{} @ {} Hz", s.width, s.height, s.frequency_hz);
    println!(
        "  Retry interval: {} ms, receive timeout: {} ms",
        s.retry_interval_ms, s.receive_timeout_ms
    );

    println!("\nSync:");
    println!("  Lead threshold: {:.1} ms", info.sync.lead_threshold_ms);
    println!("  Desync threshold: {:.1} ms", info.sync.desync_threshold_ms);

    let d = &info.drop_filter;
    println!("\nDrop filter:");
    println!(
        "  tau = {} s @ {} Hz, clamp {} frames, warm-up {} cycles",
        d.time_constant_s, d.model_frequency_hz, d.max_dropped_per_cycle, d.warmup_cycles
    );

    if !info.inputs.is_empty() {
        println!("\nModel inputs:");
        for input in &info.inputs {
            println!("  {:<20} {:>8}", input.name, input.len);
        }
        println!("  {:<20} {:>8}", "(output)", MODEL_OUTPUT_SIZE);
    }

    if !info.sinks.is_empty() {
        println!("\nSinks:");
        for sink in &info.sinks {
            println!(
                "  - {} ({}), queue {}",
                sink.name, sink.sink_type, sink.queue_capacity
            );
        }
    }

    println!();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_inputs_listed_on_request() {
        let args = InfoArgs {
            config: PathBuf::from("unused.toml"),
            json: true,
            inputs: true,
            sinks: false,
        };
        let info = build_config_info(&ModeldConfig::default(), &args);
        assert_eq!(info.inputs.len(), 6);
        assert!(info
            .inputs
            .iter()
            .any(|i| i.name == "feature_buffer" && i.len == 12_672));
        assert!((info.sync.lead_threshold_ms - 25.0).abs() < 1e-9);
    }
}
