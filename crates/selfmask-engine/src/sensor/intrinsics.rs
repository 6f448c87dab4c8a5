use glam::DVec3;

/// Pinhole intrinsics paired with the image size they were calibrated for.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct CameraIntrinsics {
    /// Focal length in pixels (x-axis).
    pub fx: f64,
    /// Focal length in pixels (y-axis).
    pub fy: f64,
    /// Principal point x (pixels).
    pub cx: f64,
    /// Principal point y (pixels).
    pub cy: f64,
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
}

impl CameraIntrinsics {
    pub fn new(fx: f64, fy: f64, cx: f64, cy: f64, width: u32, height: u32) -> Self {
        Self {
            fx,
            fy,
            cx,
            cy,
            width,
            height,
        }
    }

    /// Reads intrinsics from a row-major 3×4 calibration projection matrix `P`.
    ///
    /// ```text
    /// [fx'  0  cx' Tx]
    /// [ 0  fy' cy' Ty]
    /// [ 0   0   1   0]
    /// ```
    pub fn from_projection(p: &[f64; 12], width: u32, height: u32) -> Self {
        Self::new(p[0], p[5], p[2], p[6], width, height)
    }

    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Projects a point in the optical frame to continuous pixel coordinates.
    ///
    /// Pixel (0, 0) is the top-left corner of the top-left pixel.
    #[inline]
    pub fn project(&self, p: DVec3) -> (f64, f64) {
        (self.fx * p.x / p.z + self.cx, self.fy * p.y / p.z + self.cy)
    }

    /// Back-projects pixel (`u`, `v`) to the optical-frame point at depth `z`.
    #[inline]
    pub fn unproject(&self, u: f64, v: f64, z: f64) -> DVec3 {
        DVec3::new((u - self.cx) / self.fx * z, (v - self.cy) / self.fy * z, z)
    }
}
