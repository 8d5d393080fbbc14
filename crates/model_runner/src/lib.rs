//! # Model Runner
//!
//! 模型主循环：时序输入缓冲、推理编排与 20Hz 周期驱动。
//!
//! 负责：
//! - desire 脉冲历史与特征历史滑动窗口
//! - 上游状态解码（desire one-hot、交通规则、导航特征）
//! - 图像预处理 + 推理引擎调用 + 特征回灌
//! - `MainLoop` 按固定顺序驱动每个周期并发布结果
//!
//! ## 使用示例
//!
//! ```ignore
//! use model_runner::{InferenceOrchestrator, MainLoop};
//!
//! let orchestrator = InferenceOrchestrator::new(engine, main_prep, wide_prep);
//! let mut main_loop = MainLoop::start(&mut transport, &config, upstream, orchestrator, publisher)?;
//! let stats = main_loop.run(&stop, None)?;
//! ```

mod error;
mod history;
mod inputs;
mod main_loop;
pub mod mock;
mod orchestrator;

pub use error::RunnerError;
pub use history::{HistoryWindow, TemporalBufferManager};
pub use inputs::{desire_vector, traffic_convention, ModelInputSet, UpstreamInputs};
pub use main_loop::{CycleContext, CycleOutcome, LoopStats, MainLoop};
pub use orchestrator::InferenceOrchestrator;
