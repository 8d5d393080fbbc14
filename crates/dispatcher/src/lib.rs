//! # Dispatcher
//!
//! 模型输出分发模块。
//!
//! 负责：
//! - 通过 `ChannelPublisher` 接收主循环发布的 `ModelOutputRecord`
//! - Fan-out 到多个 sinks
//! - 隔离慢 sink，不阻塞 20 Hz 主循环

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod publisher;
pub mod sinks;

pub use contracts::{DataSink, ModelOutputRecord};
pub use dispatcher::{create_dispatcher, DispatchReport, DispatchSummary, Dispatcher};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use publisher::{ChannelPublisher, publisher_channel};
pub use sinks::{
    FileSink, FileSinkConfig, LogSink, NetworkFormat, NetworkPayload, NetworkSink,
    NetworkSinkConfig, PacketHeader,
};
