//! # Frame Sync
//!
//! 双相机帧同步与丢帧率估计。
//!
//! 负责：
//! - 相机流发现、选择与带重试的连接
//! - 主流领先辅流 25ms 的对齐策略，单相机模式退化
//! - 失步检测（仅告警，不阻塞）
//! - 丢帧计数与一阶低通丢帧率估计
//!
//! ## 使用示例
//!
//! ```ignore
//! use frame_sync::{FrameSyncCoordinator, SyncOutcome};
//!
//! let (mut coordinator, selection) =
//!     FrameSyncCoordinator::open(&mut transport, &config.streams, config.sync.clone())?;
//!
//! match coordinator.next_pair() {
//!     SyncOutcome::Synced(frames) => { /* evaluate */ }
//!     _ => { /* retry next cycle */ }
//! }
//! ```

mod coordinator;
mod drop_filter;
mod error;
mod streams;

pub use coordinator::{
    dropped_frames, FrameSyncCoordinator, SyncOutcome, SyncState, SyncStats, SyncedFrames,
};
pub use drop_filter::{DropRateEstimator, FirstOrderFilter};
pub use error::FrameSyncError;
pub use streams::{connect_with_retry, wait_for_streams, StreamSelection};

// Re-export contracts types
pub use contracts::{CameraFrame, DropFilterConfig, StreamType, StreamsConfig, SyncConfig};
