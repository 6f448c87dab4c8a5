use crate::sensor::FrameHeader;

/// Published outputs.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Output {
    FilteredDepth,
    Mask,
}

/// Filtered depth image: single-channel `f32` metres.
#[derive(Debug, Clone, PartialEq)]
pub struct DepthImage {
    pub header: FrameHeader,
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl DepthImage {
    pub const ENCODING: &'static str = "32FC1";

    #[inline]
    pub fn at(&self, x: u32, y: u32) -> f32 {
        self.data[y as usize * self.width as usize + x as usize]
    }
}

/// Binary mask: `1` robot, `0` background.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskImage {
    pub header: FrameHeader,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl MaskImage {
    pub const ENCODING: &'static str = "mono8";

    #[inline]
    pub fn at(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    /// Number of robot pixels.
    pub fn robot_pixels(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }
}

/// Output boundary. Fire-and-forget: publishing never fails back into the pipeline.
pub trait Publisher {
    /// Whether anyone currently consumes `output`.
    fn has_subscribers(&self, output: Output) -> bool;

    fn publish_depth(&mut self, image: DepthImage);

    fn publish_mask(&mut self, image: MaskImage);
}

impl<T: Publisher + ?Sized> Publisher for &mut T {
    fn has_subscribers(&self, output: Output) -> bool {
        (**self).has_subscribers(output)
    }

    fn publish_depth(&mut self, image: DepthImage) {
        (**self).publish_depth(image)
    }

    fn publish_mask(&mut self, image: MaskImage) {
        (**self).publish_mask(image)
    }
}
