use bytemuck::{Pod, Zeroable};

use super::common::{
    depth_stencil_state, fullscreen_pipeline, shader_module, texture_entry, uniform_entry,
    UNFILTERABLE_FLOAT,
};
use super::ingest::FrameIngestor;
use super::target::{Attachment, RenderTarget, TargetError, ROBOT_MARKER};

/// Tunables of the per-pixel comparison.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct FilterParams {
    /// How far behind the rendered robot surface a sensed point may lie and still be erased.
    pub max_diff: f32,
    pub replace_value: f32,
    pub near: f32,
    pub far: f32,
}

/// Per-pixel robot classification.
///
/// A pixel belongs to the robot when robot geometry covers it, its sensed
/// depth is valid, and the sensed surface is no more than `max_diff` behind
/// the rendered one. Sensed depth 0 (invalid) is never robot.
///
/// The filter shader evaluates the same predicate.
#[inline]
pub fn classify(covered: bool, sensed: f32, robot: f32, max_diff: f32) -> bool {
    covered && sensed > 0.0 && sensed - robot <= max_diff
}

/// Value written to the filtered output for one pixel.
#[inline]
pub fn filter_value(covered: bool, sensed: f32, robot: f32, params: &FilterParams) -> f32 {
    if classify(covered, sensed, robot, params.max_diff) {
        params.replace_value
    } else {
        sensed
    }
}

/// Writes the filtered depth attachment and narrows the stencil marker.
///
/// Two full-screen draws:
/// 1. every pixel: `replace_value` for robot pixels, sensed depth otherwise
/// 2. stencil-gated on the marker: robot pixels are discarded, survivors
///    reset the marker to 0
///
/// Afterwards the marker is set exactly on replaced pixels.
#[derive(Default)]
pub struct FilterPass {
    filter_pipeline: Option<wgpu::RenderPipeline>,
    unmark_pipeline: Option<wgpu::RenderPipeline>,

    bind_group_layout: Option<wgpu::BindGroupLayout>,
    uniform: Option<wgpu::Buffer>,

    bind_group: Option<wgpu::BindGroup>,
    bound_generation: Option<(u64, u64)>,
}

impl FilterPass {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &RenderTarget,
        ingestor: &FrameIngestor,
        params: &FilterParams,
    ) -> Result<(), TargetError> {
        self.ensure_pipelines(device);
        self.ensure_bind_group(device, target, ingestor)?;
        self.write_uniform(queue, target, params);

        let Some(filter_pipeline) = self.filter_pipeline.as_ref() else { return Ok(()) };
        let Some(unmark_pipeline) = self.unmark_pipeline.as_ref() else { return Ok(()) };
        let Some(bind_group) = self.bind_group.as_ref() else { return Ok(()) };

        let mut rpass = target.begin_pass(
            encoder,
            "selfmask filter pass",
            Attachment::Filtered,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            wgpu::LoadOp::Load,
            wgpu::LoadOp::Load,
        )?;
        rpass.set_bind_group(0, bind_group, &[]);

        rpass.set_pipeline(filter_pipeline);
        rpass.draw(0..3, 0..1);

        rpass.set_pipeline(unmark_pipeline);
        rpass.set_stencil_reference(ROBOT_MARKER);
        rpass.draw(0..3, 0..1);
        Ok(())
    }

    fn ensure_pipelines(&mut self, device: &wgpu::Device) {
        if self.filter_pipeline.is_some() && self.unmark_pipeline.is_some() {
            return;
        }

        let shader = shader_module(device, "selfmask filter shader", include_str!("shaders/filter.wgsl"));

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("selfmask filter bgl"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::FRAGMENT, false),
                texture_entry(1, UNFILTERABLE_FLOAT),
                texture_entry(2, UNFILTERABLE_FLOAT),
            ],
        });
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("selfmask filter pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let filter_pipeline = fullscreen_pipeline(
            device,
            "selfmask filter pipeline",
            &layout,
            &shader,
            "vs_main",
            "fs_filter",
            Attachment::Filtered.format(),
            wgpu::ColorWrites::ALL,
            Some(depth_stencil_state(
                false,
                wgpu::CompareFunction::Always,
                wgpu::CompareFunction::Always,
                wgpu::StencilOperation::Keep,
                0x00,
            )),
        );
        let unmark_pipeline = fullscreen_pipeline(
            device,
            "selfmask unmark pipeline",
            &layout,
            &shader,
            "vs_main",
            "fs_unmark",
            Attachment::Filtered.format(),
            wgpu::ColorWrites::empty(),
            Some(depth_stencil_state(
                false,
                wgpu::CompareFunction::Always,
                wgpu::CompareFunction::Equal,
                wgpu::StencilOperation::Zero,
                0xff,
            )),
        );

        let uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("selfmask filter ubo"),
            size: std::mem::size_of::<FilterUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        self.filter_pipeline = Some(filter_pipeline);
        self.unmark_pipeline = Some(unmark_pipeline);
        self.bind_group_layout = Some(bind_group_layout);
        self.uniform = Some(uniform);

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
        let scratch = target.view(Attachment::Scratch).ok_or(TargetError::NotInitialized)?;
        let sensed = ingestor.view().ok_or(TargetError::NotInitialized)?;

        self.bind_group = Some(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("selfmask filter bind group"),
            layout: bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(sensed),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(scratch),
                },
            ],
        }));
        self.bound_generation = Some(key);
        Ok(())
    }

    fn write_uniform(&self, queue: &wgpu::Queue, target: &RenderTarget, params: &FilterParams) {
        let Some(ubo) = self.uniform.as_ref() else { return };
        let (width, height) = target.size();
        let u = FilterUniform {
            max_diff: params.max_diff,
            replace_value: params.replace_value,
            near: params.near,
            far: params.far,
            width: width.max(1),
            height: height.max(1),
            _pad: [0; 2],
        };
        queue.write_buffer(ubo, 0, bytemuck::bytes_of(&u));
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct FilterUniform {
    max_diff: f32,
    replace_value: f32,
    near: f32,
    far: f32,
    width: u32,
    height: u32,
    _pad: [u32; 2],
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX_DIFF: f32 = 0.05;

    fn params() -> FilterParams {
        FilterParams {
            max_diff: MAX_DIFF,
            replace_value: 5.0,
            near: 0.1,
            far: 8.0,
        }
    }

    // ── threshold boundary ────────────────────────────────────────────────

    #[test]
    fn difference_equal_to_tolerance_is_robot() {
        assert!(classify(true, 0.05, 0.0, MAX_DIFF));
        assert!(classify(true, 1.05, 1.0, MAX_DIFF));
    }

    #[test]
    fn difference_just_above_tolerance_is_background() {
        assert!(!classify(true, 0.0501, 0.0, MAX_DIFF));
        assert!(!classify(true, 1.0501, 1.0, MAX_DIFF));
    }

    #[test]
    fn sensed_in_front_of_robot_is_robot() {
        // A surface closer than the rendered model is taken as the robot itself.
        assert!(classify(true, 0.8, 1.0, MAX_DIFF));
    }

    // ── invalid depth ─────────────────────────────────────────────────────

    #[test]
    fn zero_depth_is_never_replaced() {
        for robot in [0.0, 0.1, 1.0, 7.9] {
            for max_diff in [0.0, 0.05, 100.0] {
                assert!(!classify(true, 0.0, robot, max_diff));
            }
        }
        assert_eq!(filter_value(true, 0.0, 1.0, &params()), 0.0);
    }

    #[test]
    fn nan_depth_is_never_replaced() {
        assert!(!classify(true, f32::NAN, 1.0, MAX_DIFF));
    }

    // ── coverage ──────────────────────────────────────────────────────────

    #[test]
    fn uncovered_pixels_pass_through() {
        assert!(!classify(false, 1.0, 1.0, MAX_DIFF));
        assert_eq!(filter_value(false, 2.5, 2.5, &params()), 2.5);
    }

    #[test]
    fn robot_pixels_take_replace_value() {
        assert_eq!(filter_value(true, 1.02, 1.0, &params()), 5.0);
        assert_eq!(filter_value(true, 3.0, 1.0, &params()), 3.0);
    }

    #[test]
    fn uniform_is_32_bytes() {
        assert_eq!(std::mem::size_of::<FilterUniform>(), 32);
    }
}
