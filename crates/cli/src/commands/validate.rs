//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::ModeldConfig;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    cameras: Vec<&'static str>,
    frequency_hz: f64,
    drop_time_constant_s: f64,
    sink_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(config) => {
            let warnings = collect_warnings(&config);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: (!warnings.is_empty()).then_some(warnings),
                summary: Some(ConfigSummary {
                    version: format!("{:?}", config.version),
                    cameras: enabled_cameras(&config),
                    frequency_hz: config.simulation.frequency_hz,
                    drop_time_constant_s: config.drop_filter.time_constant_s,
                    sink_count: config.sinks.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

fn enabled_cameras(config: &ModeldConfig) -> Vec<&'static str> {
    let mut cameras = Vec::new();
    if config.simulation.road {
        cameras.push("road");
    }
    if config.simulation.wide_road {
        cameras.push("wide_road");
    }
    cameras
}

/// Non-fatal issues
fn collect_warnings(config: &ModeldConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if config.sinks.is_empty() {
        warnings.push("No sinks configured - model outputs will be dropped".to_string());
    }

    if !(config.simulation.road && config.simulation.wide_road) {
        warnings.push("Only one camera enabled - running in single-camera mode".to_string());
    }

    if config.sync.desync_threshold_ns >= config.sync.lead_threshold_ns {
        warnings.push(format!(
            "sync.desync_threshold_ns ({}) >= sync.lead_threshold_ns ({}) - desync will never be reported",
            config.sync.desync_threshold_ns, config.sync.lead_threshold_ns
        ));
    }

    if (config.drop_filter.model_frequency_hz - config.simulation.frequency_hz).abs() > f64::EPSILON {
        warnings.push(format!(
            "drop_filter.model_frequency_hz ({}) differs from simulation.frequency_hz ({})",
            config.drop_filter.model_frequency_hz, config.simulation.frequency_hz
        ));
    }

    if config.simulation.calibration_rpy.is_none() {
        warnings.push("No calibration published - warps stay zero".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!("  Cameras: {}", summary.cameras.join(", "));
            println!("  Frequency: {} Hz", summary.frequency_hz);
            println!("  Drop filter tau: {} s", summary.drop_time_constant_s);
            println!("  Sinks: {}", summary.sink_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
