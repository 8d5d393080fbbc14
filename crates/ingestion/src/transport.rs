//! Frame transports over channel-backed sources.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use contracts::{
    BufferInfo, ContractError, FrameSource, FrameTransport, SimulationConfig, StreamType,
    StreamsConfig,
};
use tracing::info;

use crate::camera::{SimulatedCamera, SimulatedCameraConfig};
use crate::channel::{frame_channel, ChannelFrameSource, FrameFeeder};
use crate::config::BackpressureConfig;
use crate::error::Result;

/// Transport handing out pre-registered channel sources
///
/// Each stream can be opened once.
#[derive(Debug, Default)]
pub struct ChannelTransport {
    sources: HashMap<StreamType, ChannelFrameSource>,
    published: HashSet<StreamType>,
}

impl ChannelTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish a stream backed by `source`
    pub fn register(&mut self, source: ChannelFrameSource) {
        let stream = source.stream();
        self.published.insert(stream);
        self.sources.insert(stream, source);
    }

    /// Create and publish a stream, returning its producer half
    pub fn add_stream(
        &mut self,
        stream: StreamType,
        info: BufferInfo,
        backpressure: &BackpressureConfig,
        receive_timeout: Duration,
    ) -> FrameFeeder {
        let (feeder, source) = frame_channel(stream, info, backpressure, receive_timeout);
        self.register(source);
        feeder
    }
}

impl FrameTransport for ChannelTransport {
    fn available_streams(&self) -> HashSet<StreamType> {
        self.published.clone()
    }

    fn open(&mut self, stream: StreamType) -> std::result::Result<Box<dyn FrameSource>, ContractError> {
        self.sources
            .remove(&stream)
            .map(|source| Box::new(source) as Box<dyn FrameSource>)
            .ok_or_else(|| ContractError::StreamUnavailable {
                stream: stream.to_string(),
            })
    }
}

/// Simulated camera daemon: threaded cameras feeding a channel transport
pub struct SimulatedTransport {
    transport: ChannelTransport,
    cameras: Vec<(SimulatedCamera, FrameFeeder)>,
}

impl SimulatedTransport {
    /// Build cameras for every stream enabled in `config`
    pub fn from_config(config: &SimulationConfig, streams: &StreamsConfig) -> Self {
        let mut transport = ChannelTransport::new();
        let mut cameras = Vec::new();
        let backpressure = BackpressureConfig::new(
            config.channel_capacity,
            crate::DropPolicy::DropOldest,
        );
        let receive_timeout = Duration::from_millis(streams.receive_timeout_ms);

        let enabled = [
            (StreamType::Road, config.road, Duration::ZERO),
            (
                StreamType::WideRoad,
                config.wide_road,
                Duration::from_secs_f64(config.wide_skew_ms.max(0.0) / 1000.0),
            ),
        ];

        for (index, (stream, on, skew)) in enabled.into_iter().enumerate() {
            if !on {
                continue;
            }
            let mut camera_config =
                SimulatedCameraConfig::new(stream, config.width, config.height, config.frequency_hz);
            camera_config.drop_probability = config.drop_probability;
            camera_config.skew = skew;
            camera_config.seed = config.seed.map(|seed| seed.wrapping_add(index as u64));

            let feeder =
                transport.add_stream(stream, camera_config.info, &backpressure, receive_timeout);
            cameras.push((SimulatedCamera::new(camera_config), feeder));
        }

        Self { transport, cameras }
    }

    /// Start every camera on a shared clock
    pub fn start(&mut self) -> Result<()> {
        let clock = Instant::now();
        for (camera, feeder) in &mut self.cameras {
            camera.start(feeder.clone(), clock)?;
        }
        info!(cameras = self.cameras.len(), "simulated cameras started");
        Ok(())
    }

    /// Stop every camera and close the channels
    pub fn stop(&mut self) {
        for (camera, feeder) in &mut self.cameras {
            camera.stop();
            feeder.close();
        }
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }
}

impl FrameTransport for SimulatedTransport {
    fn available_streams(&self) -> HashSet<StreamType> {
        self.transport.available_streams()
    }

    fn open(&mut self, stream: StreamType) -> std::result::Result<Box<dyn FrameSource>, ContractError> {
        self.transport.open(stream)
    }
}
