use std::fmt;
use std::time::Instant;

use glam::DAffine3;

use crate::device::GraphicsDevice;
use crate::model::{MeshLibrary, ModelFrame, RobotModel};
use crate::pose::{LookupFailure, PoseLookup, PoseTime};
use crate::render::{
    Attachment, FilterPass, FrameIngestor, MaskCompositor, ProjectionCache, RenderTarget,
    SilhouetteRenderer, SilhouetteView, TargetError,
};
use crate::scene::DrawList;
use crate::sensor::{CameraIntrinsics, DepthFrame, FrameHeader};
use crate::time::RateMeter;
use crate::window::{DebugDisplay, DisplayStatus};

use super::output::{DepthImage, MaskImage, Output, Publisher};
use super::settings::FilterSettings;

/// Pipeline lifecycle.
///
/// `Uninitialized → Initializing → Ready`, and `Ready → Initializing → Ready`
/// whenever the frame size changes. Nothing renders while `Initializing`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum PipelineState {
    Uninitialized,
    Initializing,
    Ready,
}

/// Why a frame produced no output.
#[derive(Debug, Clone)]
pub enum SkipReason {
    /// The render target could not be created, or a GPU readback failed.
    Target(TargetError),
    /// The camera pose could not be resolved for this frame.
    Pose(LookupFailure),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Target(e) => write!(f, "render target: {e}"),
            SkipReason::Pose(e) => write!(f, "camera pose: {e}"),
        }
    }
}

impl std::error::Error for SkipReason {}

impl From<TargetError> for SkipReason {
    fn from(e: TargetError) -> Self {
        SkipReason::Target(e)
    }
}

/// Outputs of one processed frame. Not retained by the pipeline.
#[derive(Debug, Clone)]
pub struct FilterResult {
    pub depth: DepthImage,
    /// Present only when the mask was requested.
    pub mask: Option<MaskImage>,
}

#[derive(Debug)]
pub enum FrameOutcome {
    Published { depth: bool, mask: bool },
    Skipped(SkipReason),
}

/// GPU self-filter: removes the robot's own body from depth frames.
///
/// Single-threaded and frame-synchronous: `process` runs one frame to
/// completion, readback included, before returning.
pub struct SelfFilter {
    settings: FilterSettings,
    models: Vec<RobotModel>,
    library: MeshLibrary,

    state: PipelineState,
    /// Last size the target failed at; retried only for a different size.
    failed: Option<((u32, u32), TargetError)>,

    ingestor: FrameIngestor,
    target: RenderTarget,
    silhouette: SilhouetteRenderer,
    filter: FilterPass,
    mask: MaskCompositor,
    display: Option<DebugDisplay>,

    projection: ProjectionCache,
    draws: DrawList,
    rate: RateMeter,

    depth_bytes: Vec<u8>,
    mask_bytes: Vec<u8>,
}

impl SelfFilter {
    pub fn new(settings: FilterSettings, models: Vec<RobotModel>, library: MeshLibrary) -> Self {
        Self {
            settings,
            models,
            library,
            state: PipelineState::Uninitialized,
            failed: None,
            ingestor: FrameIngestor::new(),
            target: RenderTarget::new(),
            silhouette: SilhouetteRenderer::new(),
            filter: FilterPass::new(),
            mask: MaskCompositor::new(),
            display: None,
            projection: ProjectionCache::new(),
            draws: DrawList::new(),
            rate: RateMeter::new(),
            depth_bytes: Vec::new(),
            mask_bytes: Vec::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    pub fn models(&self) -> &[RobotModel] {
        &self.models
    }

    /// Size of the live render target, if any.
    pub fn target_size(&self) -> Option<(u32, u32)> {
        self.target.is_initialized().then(|| self.target.size())
    }

    /// Presents the attachment mosaic after every processed frame.
    ///
    /// While attached, the mask pass runs every frame.
    pub fn attach_display(&mut self, display: DebugDisplay) {
        self.display = Some(display);
    }

    pub fn has_display(&self) -> bool {
        self.display.is_some()
    }

    /// Optical frame ← fixed frame: the live camera pose with the mounting offset removed.
    pub fn camera_from_fixed(
        &self,
        poses: &dyn PoseLookup,
        at: PoseTime,
    ) -> Result<DAffine3, LookupFailure> {
        self.camera_pose(poses, at, Instant::now() + self.settings.pose_timeout)
    }

    fn camera_pose(
        &self,
        poses: &dyn PoseLookup,
        at: PoseTime,
        deadline: Instant,
    ) -> Result<DAffine3, LookupFailure> {
        let camera_from_fixed = poses.lookup(
            &self.settings.fixed_frame,
            &self.settings.camera_frame,
            at,
            deadline.saturating_duration_since(Instant::now()),
        )?;
        Ok(self.settings.camera_offset.inverse_transform() * camera_from_fixed)
    }

    /// The time pose lookups are made at for a frame stamped `header`.
    fn pose_time(&self, header: &FrameHeader) -> PoseTime {
        if self.settings.pose_at_frame_stamp {
            PoseTime::At(header.stamp)
        } else {
            PoseTime::Latest
        }
    }

    /// Processes one frame and publishes the outputs that have consumers.
    pub fn process<P: Publisher + ?Sized>(
        &mut self,
        gpu: &GraphicsDevice,
        frame: &DepthFrame,
        intrinsics: &CameraIntrinsics,
        poses: &dyn PoseLookup,
        publisher: &mut P,
    ) -> FrameOutcome {
        let want_depth = publisher.has_subscribers(Output::FilteredDepth);
        let want_mask = publisher.has_subscribers(Output::Mask);

        match self.filter_frame(gpu, frame, intrinsics, poses, want_mask) {
            Ok(result) => {
                if want_depth {
                    publisher.publish_depth(result.depth);
                }
                let mask = match result.mask {
                    Some(m) => {
                        publisher.publish_mask(m);
                        true
                    }
                    None => false,
                };
                FrameOutcome::Published {
                    depth: want_depth,
                    mask,
                }
            }
            Err(reason) => FrameOutcome::Skipped(reason),
        }
    }

    /// Runs every stage for `frame` and reads the results back.
    ///
    /// `want_mask` controls whether the mask is read back; the mask pass
    /// itself also runs while a debug display is attached.
    pub fn filter_frame(
        &mut self,
        gpu: &GraphicsDevice,
        frame: &DepthFrame,
        intrinsics: &CameraIntrinsics,
        poses: &dyn PoseLookup,
        want_mask: bool,
    ) -> Result<FilterResult, SkipReason> {
        self.ensure_target(gpu, frame.dims())?;

        // Camera and link lookups together wait at most one pose timeout.
        let deadline = Instant::now() + self.settings.pose_timeout;
        let at = self.pose_time(&frame.header);
        let camera_from_fixed = self.camera_pose(poses, at, deadline).map_err(|e| {
            log::error!("skipping frame {}: {e}", frame.header.stamp);
            SkipReason::Pose(e)
        })?;

        let device = gpu.device();
        let queue = gpu.queue();
        self.ingestor.upload(device, queue, frame);

        self.draws.clear();
        let model_frame = ModelFrame {
            camera_from_fixed,
            fixed_frame: &self.settings.fixed_frame,
            at,
            deadline,
            poses,
        };
        for model in &self.models {
            model.render(&model_frame, &mut self.draws);
        }

        let (depth, mask) = self.render_and_read(gpu, intrinsics, want_mask).map_err(|e| {
            log::error!("GPU stage failed: {e}");
            SkipReason::Target(e)
        })?;

        if let Some(display) = self.display.as_mut() {
            let far = self.settings.far_plane;
            if display.present(gpu, &self.target, &self.ingestor, far) == DisplayStatus::Closed {
                log::info!("debug display detached");
                self.display = None;
            }
        }

        if let Some(report) = self.rate.tick() {
            log::info!(
                "average filtering rate: {:.2} Hz ({} frames)",
                report.hz(),
                report.frames
            );
        }

        let header = self.output_header(&frame.header);
        let (width, height) = frame.dims();
        Ok(FilterResult {
            depth: DepthImage {
                header: header.clone(),
                width,
                height,
                data: depth,
            },
            mask: mask.map(|data| MaskImage {
                header,
                width,
                height,
                data,
            }),
        })
    }

    /// Brings the render target to `dims`, destroying and recreating it on change.
    fn ensure_target(&mut self, gpu: &GraphicsDevice, dims: (u32, u32)) -> Result<(), SkipReason> {
        if self.state == PipelineState::Ready && self.target.size() == dims {
            return Ok(());
        }
        if let Some((size, e)) = &self.failed {
            if *size == dims {
                return Err(SkipReason::Target(e.clone()));
            }
        }

        let (width, height) = dims;
        if self.state == PipelineState::Ready {
            let (w, h) = self.target.size();
            log::warn!("depth frame size changed from {w}x{h} to {width}x{height}; reinitializing");
        } else {
            log::info!("initializing render target at {width}x{height}");
        }

        self.state = PipelineState::Initializing;
        match self.target.resize(gpu.device(), gpu.queue(), width, height) {
            Ok(()) => {
                self.state = PipelineState::Ready;
                self.failed = None;
                self.rate.reset();
                Ok(())
            }
            Err(e) => {
                log::error!("render target initialization failed: {e}");
                self.state = PipelineState::Uninitialized;
                self.failed = Some((dims, e.clone()));
                Err(SkipReason::Target(e))
            }
        }
    }

    fn render_and_read(
        &mut self,
        gpu: &GraphicsDevice,
        intrinsics: &CameraIntrinsics,
        want_mask: bool,
    ) -> Result<(Vec<f32>, Option<Vec<u8>>), TargetError> {
        let device = gpu.device();
        let queue = gpu.queue();
        let (near, far) = (self.settings.near_plane, self.settings.far_plane);
        let view = SilhouetteView {
            clip_from_camera: self.projection.get(intrinsics, near, far),
            near,
            far,
        };
        let params = self.settings.filter_params();
        let run_mask = want_mask || self.display.is_some();

        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("selfmask frame encoder"),
        });

        self.silhouette.render(
            device,
            queue,
            &mut encoder,
            &self.target,
            &view,
            &self.draws,
            &self.library,
        )?;
        self.filter
            .render(device, queue, &mut encoder, &self.target, &self.ingestor, &params)?;
        if run_mask {
            self.mask.render(device, &mut encoder, &self.target)?;
        }

        self.target.record_readback(&mut encoder, Attachment::Filtered)?;
        if want_mask {
            self.target.record_readback(&mut encoder, Attachment::Mask)?;
        }
        queue.submit(std::iter::once(encoder.finish()));

        self.target
            .finish_readback(device, Attachment::Filtered, &mut self.depth_bytes)?;
        let depth = bytemuck::pod_collect_to_vec::<u8, f32>(&self.depth_bytes);

        let mask = if want_mask {
            self.target
                .finish_readback(device, Attachment::Mask, &mut self.mask_bytes)?;
            Some(self.mask_bytes.clone())
        } else {
            None
        };
        Ok((depth, mask))
    }

    fn output_header(&self, input: &FrameHeader) -> FrameHeader {
        let frame_id = if input.frame_id.is_empty() {
            self.settings.camera_frame.clone()
        } else {
            input.frame_id.clone()
        };
        FrameHeader::new(input.stamp, frame_id)
    }
}
