use glam::{DAffine3, DQuat, DVec3};

/// Fixed mounting offset between the sensor's optical frame and the frame the
/// kinematic rendering is expressed in.
///
/// Loaded once at startup and never changed afterwards.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ExtrinsicOffset {
    pub translation: DVec3,
    /// Unit quaternion.
    pub rotation: DQuat,
}

impl ExtrinsicOffset {
    /// Builds an offset from a translation and an `[x, y, z, w]` quaternion.
    ///
    /// The quaternion is normalized; callers reject a zero quaternion beforehand.
    pub fn new(translation: [f64; 3], rotation_xyzw: [f64; 4]) -> Self {
        let [x, y, z, w] = rotation_xyzw;
        Self {
            translation: DVec3::from_array(translation),
            rotation: DQuat::from_xyzw(x, y, z, w).normalize(),
        }
    }

    pub fn identity() -> Self {
        Self {
            translation: DVec3::ZERO,
            rotation: DQuat::IDENTITY,
        }
    }

    /// The offset as a rigid transform.
    #[inline]
    pub fn transform(&self) -> DAffine3 {
        DAffine3::from_rotation_translation(self.rotation, self.translation)
    }

    /// Inverse of the offset; this is what is applied to the rendered scene.
    #[inline]
    pub fn inverse_transform(&self) -> DAffine3 {
        self.transform().inverse()
    }
}

impl Default for ExtrinsicOffset {
    fn default() -> Self {
        Self::identity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_undoes_offset() {
        let off = ExtrinsicOffset::new([0.1, -0.2, 0.3], [0.0, 0.0, 0.7071068, 0.7071068]);
        let p = DVec3::new(1.0, 2.0, 3.0);
        let back = off.inverse_transform().transform_point3(off.transform().transform_point3(p));
        assert!((back - p).length() < 1e-9);
    }

    #[test]
    fn rotation_is_normalized() {
        let off = ExtrinsicOffset::new([0.0; 3], [0.0, 0.0, 0.0, 2.0]);
        assert!((off.rotation.length() - 1.0).abs() < 1e-12);
        assert_eq!(off.transform(), DAffine3::IDENTITY);
    }
}
