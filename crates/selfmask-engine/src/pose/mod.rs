//! Rigid-transform lookup between named frames.
//!
//! The pipeline never owns robot or camera poses; it asks a `PoseLookup` once
//! per frame for the camera chain and once per link. Failures are values, not
//! panics: a frame whose camera pose cannot be resolved is skipped.
//!
//! Frames form a forest: every frame has at most one parent. A lookup walks
//! both frames up to their root and composes the two chains.

mod buffer;
mod chain;
mod error;
mod lookup;

pub use buffer::PoseBuffer;
pub use error::LookupFailure;
pub use lookup::{PoseLookup, PoseTime, StaticPoseLookup};
