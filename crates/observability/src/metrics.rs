//! Model loop 指标收集模块
//!
//! 基于 CycleReport 收集和统计主循环的运行指标。

use contracts::CycleReport;
use metrics::{counter, gauge, histogram};

/// 从 CycleReport 记录指标
///
/// 每个完成同步的周期（含 prepare-only 周期）调用一次。
pub fn record_cycle_metrics(report: &CycleReport) {
    let outcome = if report.executed {
        "evaluated"
    } else {
        "prepare_only"
    };
    counter!("modeld_cycles_total", "outcome" => outcome).increment(1);

    gauge!("modeld_last_frame_id").set(f64::from(report.frame_id));

    if report.frames_dropped > 0 {
        counter!("modeld_frames_dropped_total").increment(u64::from(report.frames_dropped));
    }
    gauge!("modeld_frame_drop_ratio").set(f64::from(report.frame_drop_ratio));

    // 执行耗时 (秒 -> 毫秒)
    histogram!("modeld_execution_time_ms").record(report.execution_time * 1000.0);

    // 双目时间差 (纳秒 -> 毫秒)
    histogram!("modeld_frame_skew_ms").record(report.skew_ns as f64 / 1e6);
}

/// 记录未同步成功的周期
pub fn record_cycle_skipped(reason: &'static str) {
    counter!("modeld_cycles_total", "outcome" => "no_frame", "reason" => reason).increment(1);
}

/// 记录输出分发
pub fn record_frame_published(sink_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "modeld_frames_published_total",
        "sink" => sink_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 周期指标聚合器
///
/// 在内存中聚合指标，便于统计和输出摘要。
#[derive(Debug, Clone, Default)]
pub struct CycleMetricsAggregator {
    /// 同步成功的周期数
    pub total_cycles: u64,

    /// 执行了模型的周期数
    pub evaluated_cycles: u64,

    /// prepare-only 周期数
    pub prepare_only_cycles: u64,

    /// 未取得帧的周期数
    pub skipped_cycles: u64,

    /// 丢帧总数
    pub total_dropped: u64,

    /// 失步周期数
    pub desync_cycles: u64,

    /// 发布失败次数
    pub publish_failures: u64,

    /// 执行耗时统计 (毫秒)
    pub execution_stats: RunningStats,

    /// 丢帧率统计
    pub drop_ratio_stats: RunningStats,

    /// 双目时间差统计 (毫秒)
    pub skew_stats: RunningStats,
}

impl CycleMetricsAggregator {
    /// 创建新的聚合器
    pub fn new() -> Self {
        Self::default()
    }

    /// 更新聚合统计
    pub fn update(&mut self, report: &CycleReport) {
        self.total_cycles += 1;
        if report.executed {
            self.evaluated_cycles += 1;
            self.execution_stats.push(report.execution_time * 1000.0);
        } else {
            self.prepare_only_cycles += 1;
        }
        self.total_dropped += u64::from(report.frames_dropped);
        if report.desynced {
            self.desync_cycles += 1;
        }
        if report.executed && !report.published {
            self.publish_failures += 1;
        }
        self.drop_ratio_stats.push(f64::from(report.frame_drop_ratio));
        self.skew_stats.push(report.skew_ns as f64 / 1e6);
    }

    /// 记录一次未取得帧的周期
    pub fn record_skip(&mut self) {
        self.skipped_cycles += 1;
    }

    /// 生成摘要报告
    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_cycles: self.total_cycles,
            evaluated_cycles: self.evaluated_cycles,
            prepare_only_cycles: self.prepare_only_cycles,
            skipped_cycles: self.skipped_cycles,
            total_dropped: self.total_dropped,
            desync_cycles: self.desync_cycles,
            publish_failures: self.publish_failures,
            evaluated_rate: if self.total_cycles > 0 {
                self.evaluated_cycles as f64 / self.total_cycles as f64 * 100.0
            } else {
                0.0
            },
            execution_time_ms: StatsSummary::from(&self.execution_stats),
            frame_drop_ratio: StatsSummary::from(&self.drop_ratio_stats),
            skew_ms: StatsSummary::from(&self.skew_stats),
        }
    }

    /// 重置统计
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// 指标摘要
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_cycles: u64,
    pub evaluated_cycles: u64,
    pub prepare_only_cycles: u64,
    pub skipped_cycles: u64,
    pub total_dropped: u64,
    pub desync_cycles: u64,
    pub publish_failures: u64,
    pub evaluated_rate: f64,
    pub execution_time_ms: StatsSummary,
    pub frame_drop_ratio: StatsSummary,
    pub skew_ms: StatsSummary,
}

impl std::fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Model Loop Summary ===")?;
        writeln!(f, "Synced cycles: {}", self.total_cycles)?;
        writeln!(
            f,
            "Evaluated cycles: {} ({:.2}%)",
            self.evaluated_cycles, self.evaluated_rate
        )?;
        writeln!(f, "Prepare-only cycles: {}", self.prepare_only_cycles)?;
        writeln!(f, "Cycles without frame: {}", self.skipped_cycles)?;
        writeln!(f, "Dropped frames: {}", self.total_dropped)?;
        writeln!(f, "Desync cycles: {}", self.desync_cycles)?;
        if self.publish_failures > 0 {
            writeln!(f, "Publish failures: {}", self.publish_failures)?;
        }
        writeln!(f, "Execution time (ms): {}", self.execution_time_ms)?;
        writeln!(f, "Frame drop ratio: {}", self.frame_drop_ratio)?;
        writeln!(f, "Frame skew (ms): {}", self.skew_ms)?;
        Ok(())
    }
}

/// 统计摘要
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
