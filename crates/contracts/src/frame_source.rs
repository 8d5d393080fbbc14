//! FrameSource / FrameTransport traits - camera transport abstraction
//!
//! Decouples the synchronisation logic from the shared-memory transport.
//! Real transports and channel-backed test doubles implement the same API.

use std::collections::HashSet;

use crate::{BufferInfo, CameraFrame, ContractError, StreamType};

/// A single camera stream client
pub trait FrameSource: Send {
    /// Stream this client is attached to
    fn stream(&self) -> StreamType;

    /// Attach to the stream.
    ///
    /// Returns `false` while the producer is not up yet; callers retry.
    fn connect(&mut self, blocking: bool) -> bool;

    /// Receive the next frame.
    ///
    /// May block for a bounded time. `None` means no frame is available
    /// right now, which is an expected, recoverable condition.
    fn receive(&mut self) -> Option<CameraFrame>;

    /// Buffer geometry, known once connected
    fn buffer_info(&self) -> Option<BufferInfo>;
}

/// Stream discovery and client construction
pub trait FrameTransport {
    /// Streams currently published by the camera daemon
    fn available_streams(&self) -> HashSet<StreamType>;

    /// Create a client for `stream`
    ///
    /// # Errors
    /// Returns `ContractError::StreamUnavailable` when the transport cannot
    /// provide the stream.
    fn open(&mut self, stream: StreamType) -> Result<Box<dyn FrameSource>, ContractError>;
}
