//! # Ingestion
//!
//! Camera frame and upstream state ingestion.
//!
//! Responsibilities:
//! - Channel-backed `FrameSource`s fed by producer threads
//! - Backpressure management and drop policy
//! - Simulated camera daemon (`SimulatedTransport`) with shared clock,
//!   random frame drops and wide-camera skew
//! - Scripted upstream state source
//!
//! ## Usage Example
//!
//! ```ignore
//! use ingestion::SimulatedTransport;
//!
//! let mut transport = SimulatedTransport::from_config(&config.simulation, &config.streams);
//! transport.start()?;
//! let main_loop = MainLoop::start(&mut transport, &config, upstream, orchestrator, publisher)?;
//! ```

mod camera;
mod channel;
mod config;
mod error;
mod transport;
mod upstream;

// Re-exports
pub use camera::{SimulatedCamera, SimulatedCameraConfig};
pub use channel::{frame_channel, ChannelFrameSource, FrameFeeder};
pub use config::{BackpressureConfig, DropPolicy, IngestionMetrics, MetricsSnapshot};
pub use error::{IngestionError, Result};
pub use transport::{ChannelTransport, SimulatedTransport};
pub use upstream::{ScriptedUpstream, UpstreamHandle};
