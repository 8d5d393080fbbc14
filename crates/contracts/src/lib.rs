//! # Contracts
//!
//! Frozen interface contracts (ICD), defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Time Model
//! - Camera timestamps are monotonic nanoseconds (`u64`) taken at start/end of frame
//! - `frame_id` is strictly increasing per stream; gaps mean dropped frames

mod config;
mod constants;
mod cycle;
mod error;
mod frame;
mod frame_source;
mod inference;
mod model_io;
mod sink;
mod upstream;

pub use config::*;
pub use constants::*;
pub use cycle::*;
pub use error::*;
pub use frame::*;
pub use frame_source::{FrameSource, FrameTransport};
pub use inference::{FramePreprocessor, InferenceEngine};
pub use model_io::*;
pub use sink::*;
pub use upstream::*;
