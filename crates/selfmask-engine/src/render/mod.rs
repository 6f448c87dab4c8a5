//! GPU rendering subsystem.
//!
//! Components, in per-frame order:
//! - `FrameIngestor`: sensed depth → sampleable texture
//! - `RenderTarget`: offscreen color attachments plus depth/stencil
//! - `SilhouetteRenderer`: robot meshes → scratch depth, coverage and stencil marker
//! - `FilterPass`: per-pixel comparison → filtered depth
//! - `MaskCompositor`: stencil → binary mask
//! - `MosaicRenderer`: optional 3×2 debug view on a window surface
//!
//! Each renderer owns its GPU resources and creates them lazily.
//!
//! Convention:
//! - geometry arrives in the camera optical frame (x right, y down, z forward)
//! - `projection_from_intrinsics` maps it to clip space with framebuffer
//!   pixel (u, v) matching image pixel (u, v)

mod common;
mod filter;
mod ingest;
mod mask;
mod mosaic;
mod projection;
mod readback;
mod silhouette;
mod target;

pub use filter::{classify, filter_value, FilterParams, FilterPass};
pub use ingest::FrameIngestor;
pub use mask::MaskCompositor;
pub use mosaic::MosaicRenderer;
pub use projection::{projection_from_intrinsics, ProjectionCache};
pub use silhouette::{SilhouetteRenderer, SilhouetteView};
pub use target::{Attachment, RenderTarget, TargetError, DEPTH_STENCIL_FORMAT, ROBOT_MARKER};
