use crate::sensor::DepthFrame;

const SENSED_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::R32Float;

/// Uploads depth frames into a sampleable `R32Float` texture.
///
/// The texture is created on the first upload and rebuilt only when the
/// frame size changes. Frames with padded rows are compacted into a staging
/// vector first; that vector is reused and only reallocated on resize.
#[derive(Default)]
pub struct FrameIngestor {
    texture: Option<wgpu::Texture>,
    view: Option<wgpu::TextureView>,
    size: (u32, u32),
    generation: u64,

    staging: Vec<f32>,
}

impl FrameIngestor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Uploads `frame`. Width/height/stride are trusted.
    pub fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, frame: &DepthFrame) {
        self.ensure_texture(device, frame.dims());
        let Some(texture) = self.texture.as_ref() else { return };

        let (width, height) = frame.dims();
        let samples: &[f32] = if frame.is_contiguous() {
            &frame.data[..width as usize * height as usize]
        } else {
            self.staging.clear();
            for y in 0..height {
                self.staging.extend_from_slice(frame.row(y));
            }
            &self.staging
        };

        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(samples),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(width * 4),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
    }

    /// View of the last uploaded frame.
    pub fn view(&self) -> Option<&wgpu::TextureView> {
        self.view.as_ref()
    }

    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// Changes whenever the texture is recreated.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    fn ensure_texture(&mut self, device: &wgpu::Device, size: (u32, u32)) {
        if self.texture.is_some() && self.size == size {
            return;
        }

        let (width, height) = size;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("selfmask sensed depth"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SENSED_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });

        self.view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        if let Some(old) = self.texture.replace(texture) {
            old.destroy();
        }
        self.size = size;
        self.generation += 1;

        let samples = width as usize * height as usize;
        self.staging = Vec::with_capacity(samples);
    }
}
