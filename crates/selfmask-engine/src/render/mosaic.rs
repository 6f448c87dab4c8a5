use bytemuck::{Pod, Zeroable};

use super::common::{fullscreen_pipeline, shader_module, texture_entry, uniform_entry, UNFILTERABLE_FLOAT};
use super::ingest::FrameIngestor;
use super::target::{Attachment, RenderTarget, TargetError};

/// Debug view: every attachment tiled into a 3×2 grid on a window surface.
///
/// ```text
/// sensed    scratch  depth buffer
/// filtered  mask     reserved
/// ```
///
/// Presentation only; nothing here feeds back into the filter output.
#[derive(Default)]
pub struct MosaicRenderer {
    pipeline_format: Option<wgpu::TextureFormat>,
    pipeline: Option<wgpu::RenderPipeline>,

    bind_group_layout: Option<wgpu::BindGroupLayout>,
    uniform: Option<wgpu::Buffer>,

    bind_group: Option<wgpu::BindGroup>,
    bound_generation: Option<(u64, u64)>,
}

impl MosaicRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        color_view: &wgpu::TextureView,
        surface_format: wgpu::TextureFormat,
        target: &RenderTarget,
        ingestor: &FrameIngestor,
        far: f32,
    ) -> Result<(), TargetError> {
        self.ensure_pipeline(device, surface_format);
        self.ensure_bind_group(device, target, ingestor)?;

        if let Some(ubo) = self.uniform.as_ref() {
            let u = MosaicUniform {
                far: far.max(f32::EPSILON),
                _pad: [0.0; 3],
            };
            queue.write_buffer(ubo, 0, bytemuck::bytes_of(&u));
        }

        let Some(pipeline) = self.pipeline.as_ref() else { return Ok(()) };
        let Some(bind_group) = self.bind_group.as_ref() else { return Ok(()) };

        let mut rpass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("selfmask mosaic pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(0, bind_group, &[]);
        rpass.draw(0..3, 0..1);
        Ok(())
    }

    fn ensure_pipeline(&mut self, device: &wgpu::Device, format: wgpu::TextureFormat) {
        if self.pipeline_format == Some(format) && self.pipeline.is_some() {
            return;
        }

        let shader = shader_module(device, "selfmask mosaic shader", include_str!("shaders/mosaic.wgsl"));

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("selfmask mosaic bgl"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT, false),
                texture_entry(1, UNFILTERABLE_FLOAT),
                texture_entry(2, UNFILTERABLE_FLOAT),
                texture_entry(3, wgpu::TextureSampleType::Depth),
                texture_entry(4, UNFILTERABLE_FLOAT),
                texture_entry(5, wgpu::TextureSampleType::Uint),
                texture_entry(6, UNFILTERABLE_FLOAT),
            ],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("selfmask mosaic pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = fullscreen_pipeline(
            device,
            "selfmask mosaic pipeline",
            &layout,
            &shader,
            "vs_main",
            "fs_main",
            format,
            wgpu::ColorWrites::ALL,
            None,
        );

        self.pipeline_format = Some(format);
        self.pipeline = Some(pipeline);
        self.bind_group_layout = Some(bind_group_layout);
        self.uniform = Some(device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("selfmask mosaic ubo"),
            size: std::mem::size_of::<MosaicUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));

        self.bind_group = None;
        self.bound_generation = None;
    }

    fn ensure_bind_group(
        &mut self,
        device: &wgpu::Device,
        target: &RenderTarget,
        ingestor: &FrameIngestor,
    ) -> Result<(), TargetError> {
        let key = (target.generation(), ingestor.generation());
        if self.bind_group.is_some() && self.bound_generation == Some(key) {
            return Ok(());
        }
        let (Some(bgl), Some(uniform)) = (self.bind_group_layout.as_ref(), self.uniform.as_ref()) else {
            return Ok(());
        };

        let view = |a: Attachment| target.view(a).ok_or(TargetError::NotInitialized);
        let sensed = ingestor.view().ok_or(TargetError::NotInitialized)?;
        let depth = target.depth_view().ok_or(TargetError::NotInitialized)?;
        let scratch = view(Attachment::Scratch)?;
        let filtered = view(Attachment::Filtered)?;
        let mask = view(Attachment::Mask)?;
        let reserved = view(Attachment::Reserved)?;

        let textures = [sensed, scratch, depth, filtered, mask, reserved];
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: 0,
            resource: uniform.as_entire_binding(),
        }];
        entries.extend(textures.iter().enumerate().map(|(i, v)| wgpu::BindGroupEntry {
            binding: i as u32 + 1,
            resource: wgpu::BindingResource::TextureView(v),
        }));

        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("selfmask mosaic bind group"),
            layout: bgl,
            entries: &entries,
        }));
        self.bound_generation = Some(key);
        Ok(())
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct MosaicUniform {
    far: f32,
    _pad: [f32; 3],
}
