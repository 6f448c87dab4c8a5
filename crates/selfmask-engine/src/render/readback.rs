use super::TargetError;

/// Rows in a texture→buffer copy must start on this alignment.
const COPY_ALIGNMENT: u32 = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;

#[inline]
pub(crate) fn padded_bytes_per_row(tight: u32) -> u32 {
    tight.div_ceil(COPY_ALIGNMENT) * COPY_ALIGNMENT
}

/// Mappable staging buffer for one texture, reused across frames.
pub(crate) struct ReadbackBuffer {
    buffer: wgpu::Buffer,
    width: u32,
    height: u32,
    tight_bpr: u32,
    padded_bpr: u32,
}

impl ReadbackBuffer {
    pub(crate) fn new(
        device: &wgpu::Device,
        label: &str,
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
    ) -> Self {
        let tight_bpr = width * bytes_per_pixel;
        let padded_bpr = padded_bytes_per_row(tight_bpr);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: padded_bpr as u64 * height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            width,
            height,
            tight_bpr,
            padded_bpr,
        }
    }

    /// Records the texture→buffer copy. Nothing runs until the encoder is submitted.
    pub(crate) fn record_copy(&self, encoder: &mut wgpu::CommandEncoder, texture: &wgpu::Texture) {
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &self.buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(self.padded_bpr),
                    rows_per_image: Some(self.height),
                },
            },
            wgpu::Extent3d {
                width: self.width,
                height: self.height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// Maps the buffer, blocking until the copy has landed, and strips row padding into `out`.
    pub(crate) fn read_into(&self, device: &wgpu::Device, out: &mut Vec<u8>) -> Result<(), TargetError> {
        let slice = self.buffer.slice(..);
        let (sender, receiver) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });

        device
            .poll(wgpu::PollType::wait_indefinitely())
            .map_err(|e| TargetError::Readback(format!("device poll failed: {e}")))?;

        receiver
            .recv()
            .map_err(|_| TargetError::Readback("map callback never fired".into()))?
            .map_err(|e| TargetError::Readback(format!("buffer map failed: {e}")))?;

        let tight = self.tight_bpr as usize;
        let padded = self.padded_bpr as usize;
        out.clear();
        out.reserve(tight * self.height as usize);
        {
            let mapped = slice.get_mapped_range();
            for row in mapped.chunks(padded).take(self.height as usize) {
                out.extend_from_slice(&row[..tight]);
            }
        }
        self.buffer.unmap();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_padded_to_copy_alignment() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(256), 256);
        assert_eq!(padded_bytes_per_row(640 * 4), 2560);
        assert_eq!(padded_bytes_per_row(641), 768);
    }
}
