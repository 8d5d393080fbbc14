//! 模拟相机
//!
//! 用于无真实相机环境的运行与测试：按固定帧率在独立线程中生成帧。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::Bytes;
use contracts::{BufferInfo, CameraFrame, StreamType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, trace};

use crate::channel::FrameFeeder;
use crate::error::{IngestionError, Result};

/// 时间戳起点，避免出现 0 时间戳
const CLOCK_BASE_NS: u64 = 1_000_000_000;

/// 模拟相机配置
#[derive(Debug, Clone)]
pub struct SimulatedCameraConfig {
    /// 相机流
    pub stream: StreamType,

    /// 图像尺寸
    pub info: BufferInfo,

    /// 帧率 (Hz)
    pub frequency_hz: f64,

    /// 随机丢帧概率 [0, 1)
    pub drop_probability: f64,

    /// 相对共享时钟的时间偏移
    pub skew: Duration,

    /// 随机种子
    pub seed: Option<u64>,
}

impl SimulatedCameraConfig {
    pub fn new(stream: StreamType, width: u32, height: u32, frequency_hz: f64) -> Self {
        Self {
            stream,
            info: BufferInfo::nv12(width, height),
            frequency_hz,
            drop_probability: 0.0,
            skew: Duration::ZERO,
            seed: None,
        }
    }

    fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.frequency_hz.max(1e-3))
    }
}

/// 模拟相机
///
/// 所有相机共享同一个起始时刻，帧 k 的 SOF 时间戳为
/// `base + k * period + skew`，因此同频相机天然对齐。
pub struct SimulatedCamera {
    config: SimulatedCameraConfig,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SimulatedCamera {
    /// 创建新的模拟相机
    pub fn new(config: SimulatedCameraConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn stream(&self) -> StreamType {
        self.config.stream
    }

    /// 启动生产线程
    pub fn start(&mut self, feeder: FrameFeeder, clock: Instant) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(IngestionError::AlreadyRunning {
                stream: self.config.stream,
            });
        }

        let config = self.config.clone();
        let running = self.running.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("camera-{}", config.stream))
            .spawn(move || produce(config, feeder, running, clock));

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(source) => {
                self.running.store(false, Ordering::SeqCst);
                Err(IngestionError::ThreadSpawn {
                    stream: self.config.stream,
                    source,
                })
            }
        }
    }

    /// 停止并等待线程退出
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::warn!(stream = %self.config.stream, "camera thread panicked");
            }
        }
    }

    /// 检查是否正在运行
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }
}

impl Drop for SimulatedCamera {
    fn drop(&mut self) {
        self.stop();
    }
}

fn produce(
    config: SimulatedCameraConfig,
    feeder: FrameFeeder,
    running: Arc<AtomicBool>,
    clock: Instant,
) {
    let period = config.period();
    let period_ns = period.as_nanos() as u64;
    let skew_ns = config.skew.as_nanos() as u64;
    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let drop_probability = config.drop_probability.clamp(0.0, 1.0);
    // one buffer shared by every frame; content is irrelevant downstream
    let data = Bytes::from(vec![0x80u8; config.info.len]);

    debug!(
        stream = %config.stream,
        frequency_hz = config.frequency_hz,
        width = config.info.width,
        height = config.info.height,
        "simulated camera started"
    );

    let mut tick: u32 = 0;
    while running.load(Ordering::Relaxed) {
        let target = clock + config.skew + period * tick;
        if let Some(wait) = target.checked_duration_since(Instant::now()) {
            std::thread::sleep(wait);
        }

        let frame_id = tick + 1;
        let timestamp_sof = CLOCK_BASE_NS + u64::from(tick) * period_ns + skew_ns;
        tick = tick.wrapping_add(1);

        if drop_probability > 0.0 && rng.random_bool(drop_probability) {
            feeder.skip();
            metrics::counter!(
                "modeld_simulated_frames_skipped_total",
                "stream" => config.stream.as_str()
            )
            .increment(1);
            trace!(stream = %config.stream, frame_id, "simulated frame drop");
            continue;
        }

        let frame = CameraFrame {
            stream: config.stream,
            frame_id,
            timestamp_sof,
            timestamp_eof: timestamp_sof + period_ns / 2,
            info: config.info,
            data: data.clone(),
        };
        if feeder.feed(frame).is_err() {
            debug!(stream = %config.stream, "camera channel closed");
            break;
        }
    }

    running.store(false, Ordering::SeqCst);
    debug!(stream = %config.stream, frames = tick, "simulated camera stopped");
}
