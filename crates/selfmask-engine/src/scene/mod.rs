//! Scene (draw stream) types.
//!
//! Responsibilities:
//! - store renderer-agnostic mesh draws for one frame
//! - carry each draw's pose in the camera optical frame
//!
//! Models fill a `DrawList`; the silhouette renderer consumes it.

mod cmd;
mod list;

pub use cmd::MeshDraw;
pub use list::DrawList;
