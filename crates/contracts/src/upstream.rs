//! Upstream state - latest-known values from the pub/sub subscription
//!
//! Each poll delivers a partial update: absent fields mean "unchanged since
//! the previous cycle". Recency is tracked per field.

use serde::{Deserialize, Serialize};

use crate::NAV_FEATURE_LEN;

/// Partial upstream update delivered by one poll
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UpstreamUpdate {
    /// Lateral-plan desire (-1 or out-of-range means none)
    pub desire: Option<i32>,

    /// Driver-monitoring right-hand-drive flag
    pub is_rhd: Option<bool>,

    /// Road-camera frame id the current plan was computed on
    pub road_frame_id: Option<u32>,

    /// Live calibration Euler angles `[roll, pitch, yaw]` (radians)
    pub live_calibration: Option<[f32; 3]>,

    /// Navigation feature vector
    pub nav_features: Option<Vec<f32>>,
}

impl UpstreamUpdate {
    /// True when the update carries no field at all
    pub fn is_empty(&self) -> bool {
        self.desire.is_none()
            && self.is_rhd.is_none()
            && self.road_frame_id.is_none()
            && self.live_calibration.is_none()
            && self.nav_features.is_none()
    }
}

/// Per-field recency flags, reset on every `apply`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpstreamRecency {
    pub desire: bool,
    pub is_rhd: bool,
    pub road_frame_id: bool,
    pub live_calibration: bool,
    pub nav_features: bool,
}

/// Latest-known upstream values
#[derive(Debug, Clone)]
pub struct UpstreamState {
    pub desire: i32,
    pub is_rhd: bool,
    pub road_frame_id: u32,
    pub live_calibration: Option<[f32; 3]>,
    pub nav_features: Vec<f32>,
    pub updated: UpstreamRecency,
}

impl Default for UpstreamState {
    fn default() -> Self {
        Self {
            desire: -1,
            is_rhd: false,
            road_frame_id: 0,
            live_calibration: None,
            nav_features: vec![0.0; NAV_FEATURE_LEN],
            updated: UpstreamRecency::default(),
        }
    }
}

impl UpstreamState {
    /// Merge a partial update and record which fields changed this poll.
    ///
    /// Nav feature vectors of the wrong length are ignored.
    pub fn apply(&mut self, update: UpstreamUpdate) {
        self.updated = UpstreamRecency::default();

        if let Some(desire) = update.desire {
            self.desire = desire;
            self.updated.desire = true;
        }
        if let Some(is_rhd) = update.is_rhd {
            self.is_rhd = is_rhd;
            self.updated.is_rhd = true;
        }
        if let Some(frame_id) = update.road_frame_id {
            self.road_frame_id = frame_id;
            self.updated.road_frame_id = true;
        }
        if let Some(rpy) = update.live_calibration {
            self.live_calibration = Some(rpy);
            self.updated.live_calibration = true;
        }
        if let Some(features) = update.nav_features {
            if features.len() == NAV_FEATURE_LEN {
                self.nav_features = features;
                self.updated.nav_features = true;
            }
        }
    }
}

/// Upstream pub/sub subscription
pub trait UpstreamSource: Send {
    /// Drain whatever arrived since the previous poll
    fn poll(&mut self) -> UpstreamUpdate;
}
