use glam::{DAffine3, Mat4};

use crate::model::MeshHandle;

/// One mesh placed in the camera optical frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MeshDraw {
    pub mesh: MeshHandle,
    /// Maps mesh-local points into the camera optical frame.
    pub camera_from_mesh: DAffine3,
}

impl MeshDraw {
    #[inline]
    pub fn new(mesh: MeshHandle, camera_from_mesh: DAffine3) -> Self {
        Self {
            mesh,
            camera_from_mesh,
        }
    }

    /// Single-precision matrix for upload.
    #[inline]
    pub fn camera_from_mesh_f32(&self) -> Mat4 {
        Mat4::from(self.camera_from_mesh.as_affine3a())
    }
}
