use super::MeshDraw;

/// Recorded draw stream for a frame.
///
/// Performance characteristics:
/// - `push()` is O(1)
/// - `clear()` keeps capacity; no per-frame allocation once warmed
#[derive(Debug, Default)]
pub struct DrawList {
    items: Vec<MeshDraw>,
}

impl DrawList {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Clears recorded items. Keeps allocated capacity for reuse.
    #[inline]
    pub fn clear(&mut self) {
        self.items.clear();
    }

    #[inline]
    pub fn push(&mut self, draw: MeshDraw) {
        self.items.push(draw);
    }

    /// Returns items in insertion order.
    #[inline]
    pub fn items(&self) -> &[MeshDraw] {
        &self.items
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MeshHandle;
    use glam::{DAffine3, DVec3};

    #[test]
    fn keeps_insertion_order_and_capacity() {
        let mut list = DrawList::new();
        list.push(MeshDraw::new(MeshHandle(3), DAffine3::IDENTITY));
        list.push(MeshDraw::new(
            MeshHandle(1),
            DAffine3::from_translation(DVec3::Z),
        ));
        assert_eq!(list.len(), 2);
        assert_eq!(list.items()[0].mesh, MeshHandle(3));
        assert_eq!(list.items()[1].mesh, MeshHandle(1));

        let cap = list.items.capacity();
        list.clear();
        assert!(list.is_empty());
        assert_eq!(list.items.capacity(), cap);
    }

    #[test]
    fn f32_matrix_matches_pose() {
        let d = MeshDraw::new(MeshHandle(0), DAffine3::from_translation(DVec3::new(1.0, 2.0, 3.0)));
        let m = d.camera_from_mesh_f32();
        assert_eq!(m.w_axis.truncate(), glam::Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(m.w_axis.w, 1.0);
    }
}
