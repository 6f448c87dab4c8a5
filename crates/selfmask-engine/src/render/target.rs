use std::fmt;

use super::readback::ReadbackBuffer;

/// Combined depth/stencil attachment format.
pub const DEPTH_STENCIL_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24PlusStencil8;

/// Stencil value written wherever robot geometry was rasterised.
pub const ROBOT_MARKER: u32 = 1;

/// Color attachments of the offscreen target.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Attachment {
    /// `r` = linear depth of the front-most rendered surface, `g` = robot coverage.
    Scratch = 0,
    /// Filtered depth output.
    Filtered = 1,
    /// Allocated and cleared, never written by a pass.
    Reserved = 2,
    /// `1` robot, `0` background.
    Mask = 3,
}

impl Attachment {
    pub const ALL: [Attachment; 4] = [
        Attachment::Scratch,
        Attachment::Filtered,
        Attachment::Reserved,
        Attachment::Mask,
    ];

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn format(self) -> wgpu::TextureFormat {
        match self {
            Attachment::Scratch => wgpu::TextureFormat::Rg32Float,
            Attachment::Filtered | Attachment::Reserved => wgpu::TextureFormat::R32Float,
            Attachment::Mask => wgpu::TextureFormat::R8Uint,
        }
    }

    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Attachment::Scratch => 8,
            Attachment::Filtered | Attachment::Reserved => 4,
            Attachment::Mask => 1,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Attachment::Scratch => "selfmask scratch",
            Attachment::Filtered => "selfmask filtered",
            Attachment::Reserved => "selfmask reserved",
            Attachment::Mask => "selfmask mask",
        }
    }
}

/// Render target configuration rejected by the device.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetError {
    ZeroSize { width: u32, height: u32 },
    TooLarge { width: u32, height: u32, max: u32 },
    NotInitialized,
    Readback(String),
}

impl TargetError {
    /// Stable diagnostic code for logs.
    pub fn code(&self) -> u32 {
        match self {
            TargetError::ZeroSize { .. } => 0x01,
            TargetError::TooLarge { .. } => 0x02,
            TargetError::NotInitialized => 0x03,
            TargetError::Readback(_) => 0x10,
        }
    }
}

impl fmt::Display for TargetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetError::ZeroSize { width, height } => {
                write!(f, "render target size {width}x{height} is empty")
            }
            TargetError::TooLarge { width, height, max } => {
                write!(f, "render target size {width}x{height} exceeds device limit {max}")
            }
            TargetError::NotInitialized => write!(f, "render target is not initialized"),
            TargetError::Readback(msg) => write!(f, "readback failed: {msg}"),
        }?;
        write!(f, " (code 0x{:02x})", self.code())
    }
}

impl std::error::Error for TargetError {}

struct ColorAttachment {
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    readback: ReadbackBuffer,
}

struct Attachments {
    colors: [ColorAttachment; 4],
    depth_stencil: wgpu::Texture,
    depth_stencil_view: wgpu::TextureView,
    depth_view: wgpu::TextureView,
}

impl Attachments {
    fn destroy(&self) {
        for c in &self.colors {
            c.texture.destroy();
        }
        self.depth_stencil.destroy();
    }
}

/// Offscreen multi-attachment target sized to the current depth frame.
///
/// Once `initialize` succeeds, every attachment shares the same size and
/// stays valid until the next `resize` or `release`. There is no partial
/// reuse across sizes.
#[derive(Default)]
pub struct RenderTarget {
    size: (u32, u32),
    attachments: Option<Attachments>,
    /// Bumped on every successful `initialize`; bind groups key on it.
    generation: u64,
}

impl RenderTarget {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.attachments.is_some()
    }

    /// Size of the live attachments; `(0, 0)` when uninitialized.
    #[inline]
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Checks a size against the device before any allocation.
    pub fn validate_size(device: &wgpu::Device, width: u32, height: u32) -> Result<(), TargetError> {
        if width == 0 || height == 0 {
            return Err(TargetError::ZeroSize { width, height });
        }
        let max = device.limits().max_texture_dimension_2d;
        if width > max || height > max {
            return Err(TargetError::TooLarge { width, height, max });
        }
        Ok(())
    }

    /// Allocates all attachments at `width`×`height`, releasing any previous ones.
    ///
    /// On error the target is left uninitialized.
    pub fn initialize(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
    ) -> Result<(), TargetError> {
        self.release();
        Self::validate_size(device, width, height)?;

        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let usage = wgpu::TextureUsages::RENDER_ATTACHMENT
            | wgpu::TextureUsages::TEXTURE_BINDING
            | wgpu::TextureUsages::COPY_SRC;

        let colors = Attachment::ALL.map(|a| {
            let texture = device.create_texture(&wgpu::TextureDescriptor {
                label: Some(a.label()),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: a.format(),
                usage,
                view_formats: &[],
            });
            let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
            let readback = ReadbackBuffer::new(device, a.label(), width, height, a.bytes_per_pixel());
            ColorAttachment {
                texture,
                view,
                readback,
            }
        });

        let depth_stencil = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("selfmask depth/stencil"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_STENCIL_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let depth_stencil_view = depth_stencil.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth_stencil.create_view(&wgpu::TextureViewDescriptor {
            label: Some("selfmask depth-only view"),
            aspect: wgpu::TextureAspect::DepthOnly,
            ..Default::default()
        });

        let attachments = Attachments {
            colors,
            depth_stencil,
            depth_stencil_view,
            depth_view,
        };
        clear_all(device, queue, &attachments);

        self.attachments = Some(attachments);
        self.size = (width, height);
        self.generation += 1;
        log::debug!("render target initialized at {width}x{height}");
        Ok(())
    }

    /// Destroys and reinitializes at the new size.
    pub fn resize(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        width: u32,
        height: u32,
    ) -> Result<(), TargetError> {
        self.initialize(device, queue, width, height)
    }

    /// Destroys every attachment.
    pub fn release(&mut self) {
        if let Some(a) = self.attachments.take() {
            a.destroy();
        }
        self.size = (0, 0);
    }

    pub fn view(&self, attachment: Attachment) -> Option<&wgpu::TextureView> {
        self.attachments
            .as_ref()
            .map(|a| &a.colors[attachment.index()].view)
    }

    pub fn depth_stencil_view(&self) -> Option<&wgpu::TextureView> {
        self.attachments.as_ref().map(|a| &a.depth_stencil_view)
    }

    /// Depth aspect alone, for sampling.
    pub fn depth_view(&self) -> Option<&wgpu::TextureView> {
        self.attachments.as_ref().map(|a| &a.depth_view)
    }

    /// Begins a pass drawing into one color attachment plus depth/stencil.
    ///
    /// The pass is the binding scope: dropping it ends the pass.
    pub fn begin_pass<'e>(
        &self,
        encoder: &'e mut wgpu::CommandEncoder,
        label: &str,
        attachment: Attachment,
        color_load: wgpu::LoadOp<wgpu::Color>,
        depth_load: wgpu::LoadOp<f32>,
        stencil_load: wgpu::LoadOp<u32>,
    ) -> Result<wgpu::RenderPass<'e>, TargetError> {
        let a = self.attachments.as_ref().ok_or(TargetError::NotInitialized)?;

        Ok(encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &a.colors[attachment.index()].view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: color_load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &a.depth_stencil_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: stencil_load,
                    store: wgpu::StoreOp::Store,
                }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        }))
    }

    /// Records a copy of `attachment` into its staging buffer.
    pub fn record_readback(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        attachment: Attachment,
    ) -> Result<(), TargetError> {
        let a = self.attachments.as_ref().ok_or(TargetError::NotInitialized)?;
        let c = &a.colors[attachment.index()];
        c.readback.record_copy(encoder, &c.texture);
        Ok(())
    }

    /// Maps a previously recorded readback into `out`, tightly packed.
    pub fn finish_readback(
        &self,
        device: &wgpu::Device,
        attachment: Attachment,
        out: &mut Vec<u8>,
    ) -> Result<(), TargetError> {
        let a = self.attachments.as_ref().ok_or(TargetError::NotInitialized)?;
        a.colors[attachment.index()].readback.read_into(device, out)
    }
}

impl Drop for RenderTarget {
    fn drop(&mut self) {
        self.release();
    }
}

fn clear_all(device: &wgpu::Device, queue: &wgpu::Queue, a: &Attachments) {
    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("selfmask target clear"),
    });
    for c in &a.colors {
        let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("selfmask target clear pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &c.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
    }
    queue.submit(std::iter::once(encoder.finish()));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_indices_are_stable() {
        let idx: Vec<usize> = Attachment::ALL.iter().map(|a| a.index()).collect();
        assert_eq!(idx, vec![0, 1, 2, 3]);
    }

    #[test]
    fn bytes_per_pixel_matches_format() {
        for a in Attachment::ALL {
            assert_eq!(
                a.format().block_copy_size(None),
                Some(a.bytes_per_pixel()),
                "{a:?}"
            );
        }
    }

    #[test]
    fn errors_carry_distinct_codes() {
        let errors = [
            TargetError::ZeroSize { width: 0, height: 4 },
            TargetError::TooLarge { width: 9000, height: 4, max: 8192 },
            TargetError::NotInitialized,
            TargetError::Readback("x".into()),
        ];
        let mut codes: Vec<u32> = errors.iter().map(TargetError::code).collect();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
        assert!(errors[1].to_string().contains("code 0x02"));
    }
}
