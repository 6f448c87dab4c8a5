use glam::{DAffine3, DQuat, DVec3, EulerRot};
use serde::Deserialize;

use super::mesh::MeshData;

const CYLINDER_SEGMENTS: u32 = 24;
const SPHERE_RINGS: u32 = 12;
const SPHERE_SEGMENTS: u32 = 24;

/// A robot description: links with their visual geometry.
///
/// Only what the silhouette needs is described. Joints are implicit: each
/// link's pose is resolved through the pose lookup by frame name.
///
/// ```toml
/// [[links]]
/// name = "base_link"
///
/// [[links.visuals]]
/// geometry = { type = "box", size = [0.5, 0.4, 0.2] }
/// origin = { translation = [0.0, 0.0, 0.1] }
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ModelDescription {
    #[serde(default)]
    pub links: Vec<LinkDescription>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LinkDescription {
    pub name: String,
    #[serde(default)]
    pub visuals: Vec<Visual>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Visual {
    pub geometry: Geometry,
    #[serde(default)]
    pub origin: Origin,
}

/// Placement of a visual relative to its link frame.
///
/// `rpy` (fixed-axis roll, pitch, yaw) takes precedence over `rotation`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Origin {
    #[serde(default)]
    pub translation: [f64; 3],
    /// Quaternion `[x, y, z, w]`.
    #[serde(default = "identity_rotation")]
    pub rotation: [f64; 4],
    #[serde(default)]
    pub rpy: Option<[f64; 3]>,
}

fn identity_rotation() -> [f64; 4] {
    [0.0, 0.0, 0.0, 1.0]
}

impl Default for Origin {
    fn default() -> Self {
        Self {
            translation: [0.0; 3],
            rotation: identity_rotation(),
            rpy: None,
        }
    }
}

impl Origin {
    pub fn transform(&self) -> DAffine3 {
        let rotation = match self.rpy {
            Some([roll, pitch, yaw]) => DQuat::from_euler(EulerRot::ZYX, yaw, pitch, roll),
            None => {
                let [x, y, z, w] = self.rotation;
                DQuat::from_xyzw(x, y, z, w).normalize()
            }
        };
        DAffine3::from_rotation_translation(rotation, DVec3::from_array(self.translation))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    Box {
        size: [f32; 3],
    },
    Cylinder {
        radius: f32,
        length: f32,
    },
    Sphere {
        radius: f32,
    },
    Mesh {
        positions: Vec<[f32; 3]>,
        indices: Vec<u32>,
        #[serde(default = "unit_scale")]
        scale: [f32; 3],
    },
}

fn unit_scale() -> [f32; 3] {
    [1.0; 3]
}

impl Geometry {
    /// Tessellates primitives; explicit meshes are scaled and returned as-is.
    pub fn to_mesh(&self) -> MeshData {
        match self {
            Geometry::Box { size } => MeshData::cuboid(*size),
            Geometry::Cylinder { radius, length } => {
                MeshData::cylinder(*radius, *length, CYLINDER_SEGMENTS)
            }
            Geometry::Sphere { radius } => {
                MeshData::sphere(*radius, SPHERE_RINGS, SPHERE_SEGMENTS)
            }
            Geometry::Mesh {
                positions,
                indices,
                scale,
            } => MeshData::new(positions.clone(), indices.clone()).scaled(*scale),
        }
    }
}

impl ModelDescription {
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// True when no link carries any visual geometry.
    pub fn is_empty(&self) -> bool {
        self.links.iter().all(|l| l.visuals.is_empty())
    }
}
