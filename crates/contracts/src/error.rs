//! Layered error definitions
//!
//! Categorized by source: config / stream / inference / sink

use thiserror::Error;

/// Unified error type
#[derive(Debug, Error)]
pub enum ContractError {
    // ===== Configuration Errors =====
    /// Configuration parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    // ===== Stream Errors =====
    /// Stream not published by the transport
    #[error("stream '{stream}' unavailable")]
    StreamUnavailable { stream: String },

    // ===== Inference Errors =====
    /// Inference engine failure
    #[error("engine error: {message}")]
    Engine { message: String },

    /// Frame preprocessor failure
    #[error("preprocess error for frame {frame_id}: {message}")]
    Preprocess { frame_id: u32, message: String },

    /// Buffer length does not match the model input slot
    #[error("input '{input}' shape mismatch: expected {expected}, got {actual}")]
    InputShape {
        input: String,
        expected: usize,
        actual: usize,
    },

    // ===== Sink Errors =====
    /// Sink write error
    #[error("sink '{sink_name}' write error: {message}")]
    SinkWrite { sink_name: String, message: String },

    /// Sink connection error
    #[error("sink '{sink_name}' connection error: {message}")]
    SinkConnection { sink_name: String, message: String },

    // ===== General Errors =====
    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ContractError {
    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create engine error
    pub fn engine(message: impl Into<String>) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }

    /// Create preprocess error
    pub fn preprocess(frame_id: u32, message: impl Into<String>) -> Self {
        Self::Preprocess {
            frame_id,
            message: message.into(),
        }
    }

    /// Create sink write error
    pub fn sink_write(sink_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SinkWrite {
            sink_name: sink_name.into(),
            message: message.into(),
        }
    }
}
