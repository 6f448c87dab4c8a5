use glam::{Mat4, Vec4};

use crate::sensor::CameraIntrinsics;

/// Off-axis perspective projection built directly from pinhole intrinsics.
///
/// Input space is the sensor optical frame (x right, y down, z forward).
/// Output is wgpu clip space (x right, y up, depth 0..1). A point that the
/// pinhole model projects to pixel coordinates (u, v) lands on framebuffer
/// coordinates (u, v), so the principal point is honoured exactly and no
/// field-of-view approximation is involved.
///
/// Image rows grow downward while clip-space y grows upward; that axis is the
/// one that carries the sign flip.
///
/// ```text
/// clip.x = 2fx/W · x + (2cx/W − 1) · z
/// clip.y = −2fy/H · y + (1 − 2cy/H) · z
/// clip.z = f/(f−n) · z − f·n/(f−n)
/// clip.w = z
/// ```
pub fn projection_from_intrinsics(k: &CameraIntrinsics, near: f32, far: f32) -> Mat4 {
    let w = k.width.max(1) as f64;
    let h = k.height.max(1) as f64;
    let (n, f) = (near as f64, far as f64);
    let depth = f / (f - n);

    Mat4::from_cols(
        Vec4::new((2.0 * k.fx / w) as f32, 0.0, 0.0, 0.0),
        Vec4::new(0.0, (-2.0 * k.fy / h) as f32, 0.0, 0.0),
        Vec4::new(
            (2.0 * k.cx / w - 1.0) as f32,
            (1.0 - 2.0 * k.cy / h) as f32,
            depth as f32,
            1.0,
        ),
        Vec4::new(0.0, 0.0, (-n * depth) as f32, 0.0),
    )
}

/// Caches the projection for the last intrinsics/plane combination seen.
#[derive(Debug, Default)]
pub struct ProjectionCache {
    key: Option<(CameraIntrinsics, f32, f32)>,
    matrix: Mat4,
}

impl ProjectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached matrix, recomputing only when an input changed.
    pub fn get(&mut self, k: &CameraIntrinsics, near: f32, far: f32) -> Mat4 {
        let key = (*k, near, far);
        if self.key != Some(key) {
            log::debug!(
                "projection rebuilt: fx={} fy={} cx={} cy={} {}x{} near={near} far={far}",
                k.fx,
                k.fy,
                k.cx,
                k.cy,
                k.width,
                k.height
            );
            self.matrix = projection_from_intrinsics(k, near, far);
            self.key = Some(key);
        }
        self.matrix
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{DVec3, Vec3};

    const NEAR: f32 = 0.1;
    const FAR: f32 = 8.0;

    fn kinect() -> CameraIntrinsics {
        CameraIntrinsics::new(525.0, 525.0, 320.0, 240.0, 640, 480)
    }

    fn ndc(m: &Mat4, p: Vec3) -> Vec3 {
        let c = *m * p.extend(1.0);
        c.truncate() / c.w
    }

    fn to_pixel(k: &CameraIntrinsics, ndc: Vec3) -> (f32, f32) {
        (
            (ndc.x + 1.0) * 0.5 * k.width as f32,
            (1.0 - ndc.y) * 0.5 * k.height as f32,
        )
    }

    // ── principal axis ────────────────────────────────────────────────────

    #[test]
    fn principal_axis_maps_to_ndc_centre() {
        let m = projection_from_intrinsics(&kinect(), NEAR, FAR);
        for i in 1..100 {
            let d = NEAR + (FAR - NEAR) * i as f32 / 100.0;
            let p = ndc(&m, Vec3::new(0.0, 0.0, d));
            assert!(p.x.abs() < 1e-6 && p.y.abs() < 1e-6, "d={d}: {p:?}");
            assert!(p.z > 0.0 && p.z < 1.0);
        }
    }

    #[test]
    fn off_centre_principal_point_is_preserved() {
        let k = CameraIntrinsics::new(570.3, 570.3, 314.5, 235.5, 640, 480);
        let m = projection_from_intrinsics(&k, NEAR, FAR);
        let p = ndc(&m, Vec3::new(0.0, 0.0, 2.0));
        assert!((p.x - (2.0 * 314.5 / 640.0 - 1.0)).abs() < 1e-6);
        assert!((p.y - (1.0 - 2.0 * 235.5 / 480.0)).abs() < 1e-6);
    }

    // ── pixel agreement ───────────────────────────────────────────────────

    #[test]
    fn pinhole_pixel_lands_on_same_framebuffer_pixel() {
        let k = CameraIntrinsics::new(525.0, 540.0, 310.0, 250.0, 640, 480);
        let m = projection_from_intrinsics(&k, NEAR, FAR);
        for &(u, v) in &[(0.0, 0.0), (639.0, 0.0), (17.5, 401.25), (320.0, 479.0)] {
            for &z in &[0.5, 1.7, 6.0] {
                let p = k.unproject(u, v, z);
                let (fu, fv) = to_pixel(&k, ndc(&m, p.as_vec3()));
                assert!((fu as f64 - u).abs() < 1e-3, "u={u} z={z}: {fu}");
                assert!((fv as f64 - v).abs() < 1e-3, "v={v} z={z}: {fv}");
            }
        }
    }

    #[test]
    fn image_down_is_clip_down() {
        let m = projection_from_intrinsics(&kinect(), NEAR, FAR);
        let below = ndc(&m, DVec3::new(0.0, 0.5, 2.0).as_vec3());
        let right = ndc(&m, DVec3::new(0.5, 0.0, 2.0).as_vec3());
        assert!(below.y < 0.0);
        assert!(right.x > 0.0);
    }

    // ── depth range ───────────────────────────────────────────────────────

    #[test]
    fn depth_spans_zero_to_one_between_planes() {
        let m = projection_from_intrinsics(&kinect(), NEAR, FAR);
        assert!(ndc(&m, Vec3::new(0.0, 0.0, NEAR)).z.abs() < 1e-6);
        assert!((ndc(&m, Vec3::new(0.0, 0.0, FAR)).z - 1.0).abs() < 1e-6);
        let a = ndc(&m, Vec3::new(0.0, 0.0, 1.0)).z;
        let b = ndc(&m, Vec3::new(0.0, 0.0, 2.0)).z;
        assert!(a < b);
    }

    // ── cache ─────────────────────────────────────────────────────────────

    #[test]
    fn cache_recomputes_only_on_change() {
        let mut cache = ProjectionCache::new();
        let a = cache.get(&kinect(), NEAR, FAR);
        assert_eq!(cache.get(&kinect(), NEAR, FAR), a);

        let b = cache.get(&kinect(), NEAR, 4.0);
        assert_ne!(a, b);

        let mut k = kinect();
        k.cx = 300.0;
        assert_ne!(cache.get(&k, NEAR, 4.0), b);
    }
}
