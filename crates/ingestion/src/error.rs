//! Ingestion 错误类型

use contracts::StreamType;
use thiserror::Error;

/// Ingestion 错误
#[derive(Debug, Error)]
pub enum IngestionError {
    /// 通道已关闭
    #[error("channel closed for stream {stream}")]
    ChannelClosed {
        /// 相机流
        stream: StreamType,
    },

    /// 相机已在运行
    #[error("camera {stream} is already running")]
    AlreadyRunning {
        /// 相机流
        stream: StreamType,
    },

    /// 生产线程创建失败
    #[error("failed to spawn producer thread for {stream}: {source}")]
    ThreadSpawn {
        /// 相机流
        stream: StreamType,
        #[source]
        source: std::io::Error,
    },
}

/// Ingestion Result 类型别名
pub type Result<T> = std::result::Result<T, IngestionError>;
