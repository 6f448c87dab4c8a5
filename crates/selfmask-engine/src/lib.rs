//! selfmask engine crate.
//!
//! Removes a robot's own body from a depth image stream. Each depth frame is
//! compared on the GPU against a rendering of the robot's articulated models
//! seen from the sensor, producing a filtered depth image and an optional
//! robot/background mask.

pub mod config;
pub mod core;
pub mod device;
pub mod logging;
pub mod model;
pub mod pose;
pub mod render;
pub mod scene;
pub mod sensor;
pub mod time;
pub mod window;
