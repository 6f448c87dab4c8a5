use std::fmt;

/// Capture time in nanoseconds since an arbitrary epoch chosen by the source.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Stamp(pub u64);

impl Stamp {
    #[inline]
    pub fn from_secs_f64(secs: f64) -> Self {
        Stamp((secs.max(0.0) * 1e9).round() as u64)
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 * 1e-9
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.0 / 1_000_000_000, self.0 % 1_000_000_000)
    }
}

/// Identity of a frame: when it was captured and in which sensor frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameHeader {
    pub stamp: Stamp,
    pub frame_id: String,
}

impl FrameHeader {
    pub fn new(stamp: Stamp, frame_id: impl Into<String>) -> Self {
        Self {
            stamp,
            frame_id: frame_id.into(),
        }
    }
}

/// One received depth image.
///
/// `stride` is the distance between row starts in samples. Upstream decoders
/// may hand over padded rows (`stride > width`); the ingestor compacts them.
///
/// The `width`/`height`/`stride`/`data.len()` relation is trusted, not
/// validated: a mismatch is a caller bug.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthFrame {
    pub header: FrameHeader,
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub data: Vec<f32>,
}

impl DepthFrame {
    /// Creates a frame with tightly packed rows.
    pub fn new(header: FrameHeader, width: u32, height: u32, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self {
            header,
            width,
            height,
            stride: width as usize,
            data,
        }
    }

    /// Creates a frame whose rows are `stride` samples apart.
    pub fn with_stride(
        header: FrameHeader,
        width: u32,
        height: u32,
        stride: usize,
        data: Vec<f32>,
    ) -> Self {
        debug_assert!(stride >= width as usize);
        debug_assert!(data.len() >= stride * height.saturating_sub(1) as usize + width as usize);
        Self {
            header,
            width,
            height,
            stride,
            data,
        }
    }

    /// Returns a frame of the given size filled with `depth`.
    pub fn filled(header: FrameHeader, width: u32, height: u32, depth: f32) -> Self {
        Self::new(header, width, height, vec![depth; width as usize * height as usize])
    }

    #[inline]
    pub fn dims(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// True when rows are packed back to back.
    #[inline]
    pub fn is_contiguous(&self) -> bool {
        self.stride == self.width as usize
    }

    /// Size of the packed image in bytes.
    #[inline]
    pub fn byte_size(&self) -> usize {
        self.width as usize * self.height as usize * std::mem::size_of::<f32>()
    }

    /// The active samples of row `y` (padding excluded).
    #[inline]
    pub fn row(&self, y: u32) -> &[f32] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize]
    }

    /// Sample at (`x`, `y`).
    #[inline]
    pub fn at(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.stride + x as usize]
    }
}
