//! Wires the simulated camera backend, the model loop and the dispatcher.
//!
//! The model loop is blocking (frame receive waits on the camera clock) and
//! runs on a `spawn_blocking` thread; the dispatcher and signal handling stay
//! on the async runtime.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use contracts::ModeldConfig;
use dispatcher::{create_dispatcher, publisher_channel, ChannelPublisher};
use ingestion::{ScriptedUpstream, SimulatedTransport};
use model_runner::mock::{MockEngine, MockPreprocessor};
use model_runner::{InferenceOrchestrator, LoopStats, MainLoop};
use tracing::{info, warn};

use super::PipelineStats;
use crate::error::CliError;

const DISPATCHER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub modeld: ModeldConfig,

    /// None = unlimited
    pub max_cycles: Option<u64>,

    pub timeout: Option<Duration>,

    /// Publish queue capacity
    pub buffer_size: usize,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,

    /// Preprocessors write into engine-owned input slots
    pub device_buffers: bool,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until the cycle limit, the timeout or `shutdown` resolves
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<PipelineStats> {
        let start_time = Instant::now();

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let (publisher, publish_rx) = publisher_channel(self.config.buffer_size);
        let dispatcher = create_dispatcher(self.config.modeld.sinks.clone(), publish_rx)
            .await
            .context("Failed to create dispatcher")?;
        let dispatcher_handle = dispatcher.spawn();
        info!(sinks = self.config.modeld.sinks.len(), "Dispatcher started");

        let stop = Arc::new(AtomicBool::new(false));
        let loop_stop = Arc::clone(&stop);
        let modeld = self.config.modeld.clone();
        let max_cycles = self.config.max_cycles;
        let device_buffers = self.config.device_buffers;
        let mut loop_task = tokio::task::spawn_blocking(move || {
            run_model_loop(&modeld, publisher, &loop_stop, max_cycles, device_buffers)
        });

        let deadline = async {
            match self.config.timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending().await,
            }
        };

        let finished = tokio::select! {
            joined = &mut loop_task => Some(joined),
            _ = shutdown => {
                warn!("Received shutdown signal, stopping model loop...");
                None
            }
            _ = deadline => {
                warn!("Run timed out, stopping model loop...");
                None
            }
        };
        let interrupted = finished.is_none();
        let joined = match finished {
            Some(joined) => joined,
            None => {
                stop.store(true, Ordering::Relaxed);
                loop_task.await
            }
        };
        let loop_stats = joined.map_err(|e| CliError::shutdown(e.to_string()))??;

        // The publisher was dropped with the loop, so the dispatcher drains and exits
        info!("Waiting for sinks to drain...");
        let dispatch = match tokio::time::timeout(DISPATCHER_DRAIN_TIMEOUT, dispatcher_handle).await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(e)) => return Err(CliError::shutdown(e.to_string()).into()),
            Err(_) => {
                warn!("Dispatcher did not drain in time");
                None
            }
        };

        let stats = PipelineStats {
            duration: start_time.elapsed(),
            loop_stats: Some(loop_stats),
            dispatch,
            interrupted,
        };
        info!(
            duration_secs = stats.duration.as_secs_f64(),
            "Pipeline shutdown complete"
        );
        Ok(stats)
    }
}

/// Blocking body: simulated cameras, mock engine, model loop
fn run_model_loop(
    config: &ModeldConfig,
    publisher: ChannelPublisher,
    stop: &AtomicBool,
    max_cycles: Option<u64>,
    device_buffers: bool,
) -> Result<LoopStats, CliError> {
    let mut transport = SimulatedTransport::from_config(&config.simulation, &config.streams);
    transport
        .start()
        .map_err(|e| CliError::loop_execution(e.to_string()))?;
    info!(cameras = transport.camera_count(), "Simulated camera backend started");

    let engine = if device_buffers {
        MockEngine::with_device_buffers()
    } else {
        MockEngine::new()
    };
    let orchestrator =
        InferenceOrchestrator::new(engine, MockPreprocessor::new(), MockPreprocessor::new());
    let upstream = ScriptedUpstream::from_simulation(&config.simulation);

    let result = MainLoop::start(
        &mut transport,
        config,
        Box::new(upstream),
        orchestrator,
        Box::new(publisher),
    )
    .and_then(|mut main_loop| main_loop.run(stop, max_cycles));

    transport.stop();
    result.map_err(|e| CliError::loop_execution(e.to_string()))
}
