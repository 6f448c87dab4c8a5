use super::common::{depth_stencil_state, fullscreen_pipeline, shader_module};
use super::target::{Attachment, RenderTarget, TargetError, ROBOT_MARKER};

/// Fills the mask attachment from the stencil marker.
///
/// Two stencil-gated full-screen draws: `stencil == ROBOT_MARKER` writes 1,
/// `stencil == 0` writes 0.
#[derive(Default)]
pub struct MaskCompositor {
    robot_pipeline: Option<wgpu::RenderPipeline>,
    background_pipeline: Option<wgpu::RenderPipeline>,
}

impl MaskCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn render(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        target: &RenderTarget,
    ) -> Result<(), TargetError> {
        self.ensure_pipelines(device);

        let Some(robot) = self.robot_pipeline.as_ref() else { return Ok(()) };
        let Some(background) = self.background_pipeline.as_ref() else { return Ok(()) };

        let mut rpass = target.begin_pass(
            encoder,
            "selfmask mask pass",
            Attachment::Mask,
            wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
            wgpu::LoadOp::Load,
            wgpu::LoadOp::Load,
        )?;

        rpass.set_pipeline(robot);
        rpass.set_stencil_reference(ROBOT_MARKER);
        rpass.draw(0..3, 0..1);

        rpass.set_pipeline(background);
        rpass.set_stencil_reference(0);
        rpass.draw(0..3, 0..1);
        Ok(())
    }

    fn ensure_pipelines(&mut self, device: &wgpu::Device) {
        if self.robot_pipeline.is_some() && self.background_pipeline.is_some() {
            return;
        }

        let shader = shader_module(device, "selfmask mask shader", include_str!("shaders/mask.wgsl"));
        let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("selfmask mask pipeline layout"),
            bind_group_layouts: &[],
            immediate_size: 0,
        });

        let gated = || {
            Some(depth_stencil_state(
                false,
                wgpu::CompareFunction::Always,
                wgpu::CompareFunction::Equal,
                wgpu::StencilOperation::Keep,
                0x00,
            ))
        };

        self.robot_pipeline = Some(fullscreen_pipeline(
            device,
            "selfmask mask robot pipeline",
            &layout,
            &shader,
            "vs_main",
            "fs_robot",
            Attachment::Mask.format(),
            wgpu::ColorWrites::ALL,
            gated(),
        ));
        self.background_pipeline = Some(fullscreen_pipeline(
            device,
            "selfmask mask background pipeline",
            &layout,
            &shader,
            "vs_main",
            "fs_background",
            Attachment::Mask.format(),
            wgpu::ColorWrites::ALL,
            gated(),
        ));
    }
}
