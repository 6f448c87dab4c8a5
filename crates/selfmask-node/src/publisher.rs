use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};

use selfmask_engine::core::{DepthImage, MaskImage, Output, Publisher};

use crate::replay::encode_depth;

/// Writes published outputs into a directory.
///
/// Filtered depth goes to `NNNNNN_depth.f32` (raw little-endian `f32`), the
/// mask to `NNNNNN_mask.png` (8-bit gray, 1 = robot). Write failures are
/// logged and dropped; the pipeline never sees them.
pub struct FilePublisher {
    dir: PathBuf,
    depth: bool,
    mask: bool,
    depth_written: usize,
    mask_written: usize,
}

impl FilePublisher {
    pub fn new(dir: impl Into<PathBuf>, depth: bool, mask: bool) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("cannot create output dir {}", dir.display()))?;
        Ok(Self {
            dir,
            depth,
            mask,
            depth_written: 0,
            mask_written: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn depth_written(&self) -> usize {
        self.depth_written
    }

    pub fn mask_written(&self) -> usize {
        self.mask_written
    }

    fn write_depth(&self, path: &Path, image: &DepthImage) -> Result<()> {
        std::fs::write(path, encode_depth(&image.data))?;
        Ok(())
    }

    fn write_mask(&self, path: &Path, image: &MaskImage) -> Result<()> {
        let gray = image::GrayImage::from_raw(image.width, image.height, image.data.clone())
            .ok_or_else(|| anyhow!("mask buffer does not match {}x{}", image.width, image.height))?;
        gray.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

impl Publisher for FilePublisher {
    fn has_subscribers(&self, output: Output) -> bool {
        match output {
            Output::FilteredDepth => self.depth,
            Output::Mask => self.mask,
        }
    }

    fn publish_depth(&mut self, image: DepthImage) {
        let path = self.dir.join(format!("{:06}_depth.f32", self.depth_written));
        match self.write_depth(&path, &image) {
            Ok(()) => {
                log::debug!("wrote {} (stamp {})", path.display(), image.header.stamp);
                self.depth_written += 1;
            }
            Err(e) => log::error!("cannot write {}: {e:#}", path.display()),
        }
    }

    fn publish_mask(&mut self, image: MaskImage) {
        let path = self.dir.join(format!("{:06}_mask.png", self.mask_written));
        match self.write_mask(&path, &image) {
            Ok(()) => {
                log::debug!(
                    "wrote {} (stamp {}, {} robot pixels)",
                    path.display(),
                    image.header.stamp,
                    image.robot_pixels()
                );
                self.mask_written += 1;
            }
            Err(e) => log::error!("cannot write {}: {e:#}", path.display()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::replay::decode_depth;
    use selfmask_engine::sensor::{FrameHeader, Stamp};

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("selfmask-{name}-{}", std::process::id()))
    }

    #[test]
    fn subscribers_follow_flags() {
        let dir = scratch_dir("flags");
        let p = FilePublisher::new(&dir, true, false).unwrap();
        assert!(p.has_subscribers(Output::FilteredDepth));
        assert!(!p.has_subscribers(Output::Mask));
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn writes_depth_and_mask_files() {
        let dir = scratch_dir("write");
        let mut p = FilePublisher::new(&dir, true, true).unwrap();
        let header = FrameHeader::new(Stamp(7), "cam");

        p.publish_depth(DepthImage {
            header: header.clone(),
            width: 2,
            height: 1,
            data: vec![0.5, -1.0],
        });
        p.publish_mask(MaskImage {
            header,
            width: 2,
            height: 1,
            data: vec![0, 1],
        });
        assert_eq!(p.depth_written(), 1);
        assert_eq!(p.mask_written(), 1);

        let bytes = std::fs::read(dir.join("000000_depth.f32")).unwrap();
        assert_eq!(decode_depth(&bytes, 2, 1).unwrap(), vec![0.5, -1.0]);

        let mask = image::open(dir.join("000000_mask.png")).unwrap().into_luma8();
        assert_eq!(mask.dimensions(), (2, 1));
        assert_eq!(mask.into_raw(), vec![0, 1]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn mismatched_mask_is_dropped() {
        let dir = scratch_dir("bad");
        let mut p = FilePublisher::new(&dir, true, true).unwrap();
        p.publish_mask(MaskImage {
            header: FrameHeader::default(),
            width: 4,
            height: 4,
            data: vec![0; 3],
        });
        assert_eq!(p.mask_written(), 0);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
