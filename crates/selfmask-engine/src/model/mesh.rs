use std::f32::consts::{PI, TAU};

/// Triangle mesh in its own local frame (metres).
///
/// Winding is irrelevant: silhouettes are rendered without culling.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub positions: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self { positions, indices }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty() || self.positions.is_empty()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Returns a reason when the index list is not a valid triangle list.
    pub fn check(&self) -> Result<(), String> {
        if self.indices.len() % 3 != 0 {
            return Err(format!("index count {} is not a multiple of 3", self.indices.len()));
        }
        let n = self.positions.len() as u32;
        if let Some(bad) = self.indices.iter().find(|&&i| i >= n) {
            return Err(format!("index {bad} out of range for {n} vertices"));
        }
        Ok(())
    }

    /// Scales every vertex component-wise.
    pub fn scaled(mut self, scale: [f32; 3]) -> Self {
        for p in &mut self.positions {
            p[0] *= scale[0];
            p[1] *= scale[1];
            p[2] *= scale[2];
        }
        self
    }

    /// Axis-aligned box centred on the origin.
    pub fn cuboid(size: [f32; 3]) -> Self {
        let [hx, hy, hz] = [size[0] * 0.5, size[1] * 0.5, size[2] * 0.5];
        let positions = vec![
            [-hx, -hy, -hz],
            [hx, -hy, -hz],
            [hx, hy, -hz],
            [-hx, hy, -hz],
            [-hx, -hy, hz],
            [hx, -hy, hz],
            [hx, hy, hz],
            [-hx, hy, hz],
        ];
        #[rustfmt::skip]
        let indices = vec![
            0, 2, 1, 0, 3, 2, // -z
            4, 5, 6, 4, 6, 7, // +z
            0, 1, 5, 0, 5, 4, // -y
            3, 7, 6, 3, 6, 2, // +y
            0, 4, 7, 0, 7, 3, // -x
            1, 2, 6, 1, 6, 5, // +x
        ];
        Self { positions, indices }
    }

    /// Closed cylinder around the z axis, centred on the origin.
    pub fn cylinder(radius: f32, length: f32, segments: u32) -> Self {
        let segments = segments.max(3);
        let hz = length * 0.5;
        let mut positions = Vec::with_capacity(segments as usize * 2 + 2);
        let mut indices = Vec::with_capacity(segments as usize * 12);

        for i in 0..segments {
            let a = TAU * i as f32 / segments as f32;
            let (s, c) = a.sin_cos();
            positions.push([radius * c, radius * s, -hz]);
            positions.push([radius * c, radius * s, hz]);
        }
        let bottom = positions.len() as u32;
        positions.push([0.0, 0.0, -hz]);
        let top = bottom + 1;
        positions.push([0.0, 0.0, hz]);

        for i in 0..segments {
            let j = (i + 1) % segments;
            let (b0, t0, b1, t1) = (2 * i, 2 * i + 1, 2 * j, 2 * j + 1);
            indices.extend_from_slice(&[b0, b1, t1, b0, t1, t0]);
            indices.extend_from_slice(&[bottom, b1, b0]);
            indices.extend_from_slice(&[top, t0, t1]);
        }
        Self { positions, indices }
    }

    /// UV sphere centred on the origin.
    pub fn sphere(radius: f32, rings: u32, segments: u32) -> Self {
        let rings = rings.max(2);
        let segments = segments.max(3);
        let mut positions = Vec::with_capacity(((rings + 1) * segments) as usize);
        let mut indices = Vec::with_capacity((rings * segments * 6) as usize);

        for r in 0..=rings {
            let polar = PI * r as f32 / rings as f32;
            let (sp, cp) = polar.sin_cos();
            for s in 0..segments {
                let az = TAU * s as f32 / segments as f32;
                let (sa, ca) = az.sin_cos();
                positions.push([radius * sp * ca, radius * sp * sa, radius * cp]);
            }
        }
        for r in 0..rings {
            for s in 0..segments {
                let n = (s + 1) % segments;
                let a = r * segments + s;
                let b = r * segments + n;
                let c = (r + 1) * segments + s;
                let d = (r + 1) * segments + n;
                indices.extend_from_slice(&[a, c, b, b, c, d]);
            }
        }
        Self { positions, indices }
    }
}

/// Stable handle into a [`MeshLibrary`].
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct MeshHandle(pub(crate) u32);

impl MeshHandle {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// CPU-side meshes of every loaded model. Append-only.
///
/// The scene renderer uploads each mesh the first time it is drawn.
#[derive(Debug, Default)]
pub struct MeshLibrary {
    meshes: Vec<MeshData>,
}

impl MeshLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, mesh: MeshData) -> MeshHandle {
        let handle = MeshHandle(self.meshes.len() as u32);
        self.meshes.push(mesh);
        handle
    }

    #[inline]
    pub fn get(&self, handle: MeshHandle) -> Option<&MeshData> {
        self.meshes.get(handle.index())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.meshes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.meshes.is_empty()
    }
}
