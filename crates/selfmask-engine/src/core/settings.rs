use std::time::Duration;

use crate::render::FilterParams;
use crate::sensor::ExtrinsicOffset;

/// Runtime settings of the filter pipeline, resolved once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterSettings {
    /// World-fixed reference frame the robot links are resolved in.
    pub fixed_frame: String,
    pub camera_frame: String,
    pub camera_offset: ExtrinsicOffset,
    pub max_diff: f32,
    pub replace_value: f32,
    pub show_debug_display: bool,
    pub near_plane: f32,
    pub far_plane: f32,
    pub pose_timeout: Duration,
    /// Query the camera pose at the frame stamp rather than the latest available.
    pub pose_at_frame_stamp: bool,
}

impl FilterSettings {
    /// Settings with default tolerances and clip planes.
    pub fn new(fixed_frame: impl Into<String>, camera_frame: impl Into<String>) -> Self {
        Self {
            fixed_frame: fixed_frame.into(),
            camera_frame: camera_frame.into(),
            camera_offset: ExtrinsicOffset::identity(),
            max_diff: 0.05,
            replace_value: 0.0,
            show_debug_display: false,
            near_plane: 0.1,
            far_plane: 8.0,
            pose_timeout: Duration::from_millis(100),
            pose_at_frame_stamp: false,
        }
    }

    pub fn filter_params(&self) -> FilterParams {
        FilterParams {
            max_diff: self.max_diff,
            replace_value: self.replace_value,
            near: self.near_plane,
            far: self.far_plane,
        }
    }
}
