//! GPU device management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue without a window
//! - exposing them to the pipeline components by reference
//!
//! Exactly one `GraphicsDevice` is expected per process. It is created by the
//! caller and passed into the pipeline, never held in a global.

mod gpu;
mod init;

pub use gpu::GraphicsDevice;
pub use init::GpuInit;
