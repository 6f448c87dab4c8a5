use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use selfmask_engine::sensor::{DepthFrame, FrameHeader, Stamp};

/// Decodes a raw little-endian `f32` image.
pub fn decode_depth(bytes: &[u8], width: u32, height: u32) -> Result<Vec<f32>> {
    let expected = width as usize * height as usize * 4;
    if bytes.len() != expected {
        bail!(
            "expected {expected} bytes for a {width}x{height} depth frame, got {}",
            bytes.len()
        );
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Encodes samples as raw little-endian `f32`.
pub fn encode_depth(samples: &[f32]) -> Vec<u8> {
    samples.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Recorded depth frames played back in order with synthesized stamps.
pub struct ReplaySource {
    frames: Vec<PathBuf>,
    width: u32,
    height: u32,
    frame_id: String,
    period_ns: u64,
    next: usize,
}

impl ReplaySource {
    pub fn new(
        frames: Vec<PathBuf>,
        width: u32,
        height: u32,
        frame_id: impl Into<String>,
        rate_hz: f64,
    ) -> Self {
        Self {
            frames,
            width,
            height,
            frame_id: frame_id.into(),
            period_ns: (1e9 / rate_hz).round() as u64,
            next: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    fn read(&self, index: usize, path: &Path) -> Result<DepthFrame> {
        let bytes =
            std::fs::read(path).with_context(|| format!("cannot read frame {}", path.display()))?;
        let data = decode_depth(&bytes, self.width, self.height)
            .with_context(|| format!("bad frame {}", path.display()))?;
        let stamp = Stamp(index as u64 * self.period_ns);
        Ok(DepthFrame::new(
            FrameHeader::new(stamp, self.frame_id.clone()),
            self.width,
            self.height,
            data,
        ))
    }
}

impl Iterator for ReplaySource {
    type Item = (PathBuf, Result<DepthFrame>);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.next;
        let path = self.frames.get(index)?.clone();
        self.next += 1;
        let frame = self.read(index, &path);
        Some((path, frame))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_is_little_endian_row_major() {
        let bytes = encode_depth(&[1.0, 2.5, 0.0, -1.0]);
        assert_eq!(&bytes[..4], &1.0f32.to_le_bytes());
        assert_eq!(decode_depth(&bytes, 2, 2).unwrap(), vec![1.0, 2.5, 0.0, -1.0]);
    }

    #[test]
    fn decode_rejects_wrong_size() {
        let bytes = encode_depth(&[1.0, 2.0, 3.0]);
        assert!(decode_depth(&bytes, 2, 2).is_err());
    }

    #[test]
    fn replays_files_in_order_with_increasing_stamps() {
        let dir = std::env::temp_dir().join(format!("selfmask-replay-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let a = dir.join("a.f32");
        let b = dir.join("b.f32");
        std::fs::write(&a, encode_depth(&[1.0, 1.0])).unwrap();
        std::fs::write(&b, encode_depth(&[2.0, 2.0])).unwrap();

        let source = ReplaySource::new(vec![a, b, dir.join("missing.f32")], 2, 1, "cam", 10.0);
        assert_eq!(source.len(), 3);
        let results: Vec<_> = source.map(|(_, f)| f).collect();

        let first = results[0].as_ref().unwrap();
        let second = results[1].as_ref().unwrap();
        assert_eq!(first.data, vec![1.0, 1.0]);
        assert_eq!(first.header.frame_id, "cam");
        assert_eq!(first.header.stamp, Stamp(0));
        assert_eq!(second.header.stamp, Stamp(100_000_000));
        assert!(results[2].is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
