//! Sensor-side data: depth frames, calibration intrinsics and the fixed
//! sensor mounting offset.
//!
//! Conventions:
//! - depth samples are metres, 32-bit float, row-major, row 0 at the top
//! - a sample of 0 (or NaN) is invalid
//! - the optical frame is x right, y down, z forward

mod extrinsics;
mod frame;
mod intrinsics;

pub use extrinsics::ExtrinsicOffset;
pub use frame::{DepthFrame, FrameHeader, Stamp};
pub use intrinsics::CameraIntrinsics;
