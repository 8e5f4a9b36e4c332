use serde::{Deserialize, Serialize};

use crate::board::BoardConfig;

/// Corner refinement window and stopping criteria.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubpixConfig {
    /// Half side of the search window, 5 gives an 11x11 window.
    pub half_window: usize,
    pub max_iterations: usize,
    pub epsilon: f64,
}

impl Default for SubpixConfig {
    fn default() -> Self {
        Self {
            half_window: 5,
            max_iterations: 30,
            epsilon: 0.001,
        }
    }
}

/// ChESS detector tuning, copied onto `chess_corners::ChessConfig`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Corners below `threshold_rel * max_response` are dropped.
    pub threshold_rel: f32,
    pub nms_radius: u32,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold_rel: 0.2,
            nms_radius: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrateOptions {
    pub max_iterations: usize,
    /// Keep `k3` at zero.
    pub fix_k3: bool,
    /// Keep `p1` and `p2` at zero.
    pub zero_tangent_dist: bool,
}

impl Default for CalibrateOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            fix_k3: false,
            zero_tangent_dist: false,
        }
    }
}

/// Everything the calibration run can be tuned with. Loaded from JSON, any
/// missing field falls back to its default.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibConfig {
    pub board: BoardConfig,
    pub detector: DetectorConfig,
    pub subpix: SubpixConfig,
    pub calibrate: CalibrateOptions,
}
