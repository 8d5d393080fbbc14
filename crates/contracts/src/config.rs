//! ModeldConfig - Config Loader 输出
//!
//! 描述完整的运行配置：相机流连接、同步阈值、丢帧滤波、模拟后端、输出路由。

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    DESYNC_THRESHOLD_NS, DROP_FILTER_TIME_CONSTANT_S, DROP_WARMUP_CYCLES, MAX_DROPPED_FRAMES,
    MODEL_FREQ, SYNC_LEAD_THRESHOLD_NS,
};

/// 配置版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// 完整的运行配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModeldConfig {
    /// 配置版本
    #[serde(default)]
    pub version: ConfigVersion,

    /// 相机流连接设置
    #[serde(default)]
    pub streams: StreamsConfig,

    /// 双目同步阈值
    #[serde(default)]
    pub sync: SyncConfig,

    /// 丢帧率滤波器
    #[serde(default)]
    pub drop_filter: DropFilterConfig,

    /// 模拟后端 (CLI `run`)
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// 输出路由配置
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// 相机流连接设置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamsConfig {
    /// 等待流可用 / 连接重试间隔 (毫秒)
    pub retry_interval_ms: u64,

    /// 最大连接尝试次数，0 表示无限
    pub max_connect_attempts: u32,

    /// 单次接收的最长阻塞时间 (毫秒)
    pub receive_timeout_ms: u64,
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            retry_interval_ms: 100,
            max_connect_attempts: 0,
            receive_timeout_ms: 100,
        }
    }
}

/// 同步阈值 (纳秒)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// 主流领先辅流的最小时间差
    pub lead_threshold_ns: u64,

    /// 超过该时间差即告警失步
    pub desync_threshold_ns: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            lead_threshold_ns: SYNC_LEAD_THRESHOLD_NS,
            desync_threshold_ns: DESYNC_THRESHOLD_NS,
        }
    }
}

/// 丢帧率一阶低通滤波器参数
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DropFilterConfig {
    /// 时间常数 (秒)
    pub time_constant_s: f64,

    /// 模型运行频率 (Hz)，采样周期 = 1 / 频率
    pub model_frequency_hz: f64,

    /// 每周期丢帧数上限
    pub max_dropped_per_cycle: u32,

    /// 启动预热周期数
    pub warmup_cycles: u32,
}

impl DropFilterConfig {
    /// Sample period in seconds
    pub fn sample_period_s(&self) -> f64 {
        1.0 / self.model_frequency_hz
    }
}

impl Default for DropFilterConfig {
    fn default() -> Self {
        Self {
            time_constant_s: DROP_FILTER_TIME_CONSTANT_S,
            model_frequency_hz: MODEL_FREQ,
            max_dropped_per_cycle: MAX_DROPPED_FRAMES,
            warmup_cycles: DROP_WARMUP_CYCLES,
        }
    }
}

/// 模拟后端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// 是否发布 road 相机
    pub road: bool,

    /// 是否发布 wide_road 相机
    pub wide_road: bool,

    /// 图像宽度 (像素)
    pub width: u32,

    /// 图像高度 (像素)
    pub height: u32,

    /// 相机帧率 (Hz)
    pub frequency_hz: f64,

    /// 随机丢帧概率 [0, 1)
    pub drop_probability: f64,

    /// 广角相机相对主相机的时间偏移 (毫秒)
    pub wide_skew_ms: f64,

    /// 相机通道容量
    pub channel_capacity: usize,

    /// 随机种子 (可选)
    pub seed: Option<u64>,

    /// 稳态 desire
    pub desire: i32,

    /// 右舵
    pub is_rhd: bool,

    /// 标定欧拉角 [roll, pitch, yaw] (弧度)，None 表示不发布标定
    pub calibration_rpy: Option<[f32; 3]>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            road: true,
            wide_road: true,
            width: 1928,
            height: 1208,
            frequency_hz: MODEL_FREQ,
            drop_probability: 0.0,
            wide_skew_ms: 0.0,
            channel_capacity: 4,
            seed: None,
            desire: -1,
            is_rhd: false,
            calibration_rpy: Some([0.0, 0.0, 0.0]),
        }
    }
}

/// Sink 输出配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Sink 名称
    pub name: String,

    /// Sink 类型
    pub sink_type: SinkType,

    /// 队列容量
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// 类型特定参数
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink 类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// 日志输出
    Log,
    /// 文件输出
    File,
    /// 网络输出 (UDP)
    Network,
}
