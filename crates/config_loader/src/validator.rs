//! 配置校验模块
//!
//! 校验规则：
//! - 同步阈值 > 0
//! - 丢帧滤波：时间常数 > 0，模型频率 > 0，采样周期 <= 时间常数
//! - 模拟相机：至少启用一路，频率 > 0，分辨率非零，丢帧概率 ∈ [0, 1)
//! - sink 名称非空且唯一

use std::collections::HashSet;

use contracts::{ContractError, ModeldConfig};

/// 校验 ModeldConfig
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &ModeldConfig) -> Result<(), ContractError> {
    validate_sync(config)?;
    validate_drop_filter(config)?;
    validate_simulation(config)?;
    validate_sinks(config)?;
    Ok(())
}

/// 校验同步阈值
fn validate_sync(config: &ModeldConfig) -> Result<(), ContractError> {
    let sync = &config.sync;
    if sync.lead_threshold_ns == 0 {
        return Err(ContractError::config_validation(
            "sync.lead_threshold_ns",
            "lead_threshold_ns must be > 0",
        ));
    }
    if sync.desync_threshold_ns == 0 {
        return Err(ContractError::config_validation(
            "sync.desync_threshold_ns",
            "desync_threshold_ns must be > 0",
        ));
    }
    Ok(())
}

/// 校验丢帧滤波参数
fn validate_drop_filter(config: &ModeldConfig) -> Result<(), ContractError> {
    let filter = &config.drop_filter;
    if !is_positive(filter.time_constant_s) {
        return Err(ContractError::config_validation(
            "drop_filter.time_constant_s",
            format!("time_constant_s must be > 0, got {}", filter.time_constant_s),
        ));
    }
    if !is_positive(filter.model_frequency_hz) {
        return Err(ContractError::config_validation(
            "drop_filter.model_frequency_hz",
            format!(
                "model_frequency_hz must be > 0, got {}",
                filter.model_frequency_hz
            ),
        ));
    }
    // k = dt / tau 必须 <= 1
    if filter.sample_period_s() > filter.time_constant_s {
        return Err(ContractError::config_validation(
            "drop_filter.time_constant_s",
            format!(
                "sample period ({:.4}s) must be <= time_constant_s ({}s)",
                filter.sample_period_s(),
                filter.time_constant_s
            ),
        ));
    }
    Ok(())
}

/// 校验模拟后端
fn validate_simulation(config: &ModeldConfig) -> Result<(), ContractError> {
    let sim = &config.simulation;
    if !sim.road && !sim.wide_road {
        return Err(ContractError::config_validation(
            "simulation.road / simulation.wide_road",
            "at least one camera must be enabled",
        ));
    }
    if !is_positive(sim.frequency_hz) {
        return Err(ContractError::config_validation(
            "simulation.frequency_hz",
            format!("frequency_hz must be > 0, got {}", sim.frequency_hz),
        ));
    }
    if sim.width == 0 || sim.height == 0 {
        return Err(ContractError::config_validation(
            "simulation.width / simulation.height",
            format!("resolution must be non-zero, got {}x{}", sim.width, sim.height),
        ));
    }
    if !(0.0..1.0).contains(&sim.drop_probability) {
        return Err(ContractError::config_validation(
            "simulation.drop_probability",
            format!(
                "drop_probability must be in [0, 1), got {}",
                sim.drop_probability
            ),
        ));
    }
    if sim.wide_skew_ms.is_nan() || sim.wide_skew_ms < 0.0 {
        return Err(ContractError::config_validation(
            "simulation.wide_skew_ms",
            format!("wide_skew_ms must be >= 0, got {}", sim.wide_skew_ms),
        ));
    }
    Ok(())
}

/// NaN 视为非法
fn is_positive(value: f64) -> bool {
    value > 0.0
}

/// 校验 sink 配置
fn validate_sinks(config: &ModeldConfig) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, sink) in config.sinks.iter().enumerate() {
        if sink.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("sinks[{}].name", idx),
                "sink name cannot be empty",
            ));
        }
        if !seen.insert(sink.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("sinks[name={}]", sink.name),
                "duplicate sink name",
            ));
        }
        if sink.queue_capacity == 0 {
            return Err(ContractError::config_validation(
                format!("sinks[{}].queue_capacity", sink.name),
                "queue_capacity must be > 0",
            ));
        }
    }
    Ok(())
}
