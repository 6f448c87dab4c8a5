//! Robot models.
//!
//! A model is loaded once at startup from a description source and never
//! reloaded. Per frame, each model resolves its link poses through the pose
//! lookup and pushes mesh draws into a `scene::DrawList`.
//!
//! Failures while loading are per model: the model is logged and skipped.

mod articulated;
mod description;
mod error;
mod mesh;
mod source;

pub use articulated::{link_frame, load_models, ArticulatedModel, ModelFrame, RobotModel};
pub use description::{Geometry, LinkDescription, ModelDescription, Origin, Visual};
pub use error::ModelLoadError;
pub use mesh::{MeshData, MeshHandle, MeshLibrary};
pub use source::{DirectoryModelSource, InMemoryModelSource, ModelSource};
