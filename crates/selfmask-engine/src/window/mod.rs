//! Optional debug window.
//!
//! Owns a `winit` EventLoop and one window, and presents the render target
//! mosaic on it. The loop is pumped once per processed frame, never run:
//! the pipeline stays in control of timing.

mod display;

pub use display::{DebugDisplay, DisplayConfig, DisplayStatus};
