//! Scripted upstream state source.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use contracts::{SimulationConfig, UpstreamSource, UpstreamUpdate};

/// Upstream source replaying queued updates, then a steady update
///
/// Updates can be pushed from another thread through [`UpstreamHandle`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedUpstream {
    queue: Arc<Mutex<VecDeque<UpstreamUpdate>>>,
    steady: UpstreamUpdate,
    advance_road_frame: bool,
    road_frame_id: u32,
}

/// Push side of a [`ScriptedUpstream`]
#[derive(Debug, Clone)]
pub struct UpstreamHandle {
    queue: Arc<Mutex<VecDeque<UpstreamUpdate>>>,
}

impl UpstreamHandle {
    /// Queue an update for the next poll
    pub fn push(&self, update: UpstreamUpdate) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_back(update);
        }
    }
}

impl ScriptedUpstream {
    pub fn new(script: impl IntoIterator<Item = UpstreamUpdate>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(script.into_iter().collect())),
            ..Self::default()
        }
    }

    /// Update returned whenever the queue is empty
    pub fn with_steady(mut self, steady: UpstreamUpdate) -> Self {
        self.steady = steady;
        self
    }

    /// Report an increasing road-camera frame id on every poll
    pub fn with_road_frame_counter(mut self) -> Self {
        self.advance_road_frame = true;
        self
    }

    /// Simulated planner / driver monitoring / calibration daemons
    pub fn from_simulation(config: &SimulationConfig) -> Self {
        let steady = UpstreamUpdate {
            desire: Some(config.desire),
            is_rhd: Some(config.is_rhd),
            ..Default::default()
        };
        let initial = UpstreamUpdate {
            live_calibration: config.calibration_rpy,
            ..steady.clone()
        };
        Self::new([initial])
            .with_steady(steady)
            .with_road_frame_counter()
    }

    pub fn handle(&self) -> UpstreamHandle {
        UpstreamHandle {
            queue: self.queue.clone(),
        }
    }
}

impl UpstreamSource for ScriptedUpstream {
    fn poll(&mut self) -> UpstreamUpdate {
        let queued = self
            .queue
            .lock()
            .ok()
            .and_then(|mut queue| queue.pop_front());
        let mut update = queued.unwrap_or_else(|| self.steady.clone());

        if self.advance_road_frame && update.road_frame_id.is_none() {
            self.road_frame_id = self.road_frame_id.wrapping_add(1);
            update.road_frame_id = Some(self.road_frame_id);
        }
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_then_steady() {
        let mut upstream = ScriptedUpstream::new([UpstreamUpdate {
            desire: Some(3),
            ..Default::default()
        }])
        .with_steady(UpstreamUpdate {
            desire: Some(0),
            ..Default::default()
        });

        assert_eq!(upstream.poll().desire, Some(3));
        assert_eq!(upstream.poll().desire, Some(0));
        assert_eq!(upstream.poll().desire, Some(0));
    }

    #[test]
    fn test_handle_pushes_between_polls() {
        let mut upstream = ScriptedUpstream::default();
        let handle = upstream.handle();
        assert!(upstream.poll().is_empty());

        handle.push(UpstreamUpdate {
            live_calibration: Some([0.0, 0.1, 0.0]),
            ..Default::default()
        });
        assert_eq!(upstream.poll().live_calibration, Some([0.0, 0.1, 0.0]));
        assert!(upstream.poll().is_empty());
    }

    #[test]
    fn test_simulation_sends_calibration_once() {
        let config = SimulationConfig {
            desire: 2,
            is_rhd: true,
            ..Default::default()
        };
        let mut upstream = ScriptedUpstream::from_simulation(&config);

        let first = upstream.poll();
        assert!(first.live_calibration.is_some());
        assert_eq!(first.desire, Some(2));
        assert_eq!(first.road_frame_id, Some(1));

        let second = upstream.poll();
        assert!(second.live_calibration.is_none());
        assert_eq!(second.is_rhd, Some(true));
        assert_eq!(second.road_frame_id, Some(2));
    }
}
