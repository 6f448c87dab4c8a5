//! End-to-end pipeline tests. They need a GPU adapter (a software one is fine)
//! and are ignored by default: `cargo test -- --ignored`.

use glam::{DAffine3, DVec3};

use selfmask_engine::config::ModelEntry;
use selfmask_engine::core::{
    DepthImage, FilterSettings, FrameOutcome, MaskImage, Output, PipelineState, Publisher,
    SelfFilter, SkipReason,
};
use selfmask_engine::device::{GpuInit, GraphicsDevice};
use selfmask_engine::model::{
    load_models, Geometry, InMemoryModelSource, LinkDescription, MeshLibrary, ModelDescription,
    Origin, Visual,
};
use selfmask_engine::pose::{LookupFailure, StaticPoseLookup};
use selfmask_engine::render::TargetError;
use selfmask_engine::sensor::{CameraIntrinsics, DepthFrame, FrameHeader, Stamp};

const REPLACE: f32 = -1.0;
const NEAR_ROBOT: f32 = 0.82;
const FAR_BEHIND: f32 = 3.0;

#[derive(Default)]
struct Recorder {
    subscribe_depth: bool,
    subscribe_mask: bool,
    depth: Vec<DepthImage>,
    mask: Vec<MaskImage>,
}

impl Recorder {
    fn all() -> Self {
        Self {
            subscribe_depth: true,
            subscribe_mask: true,
            ..Self::default()
        }
    }
}

impl Publisher for Recorder {
    fn has_subscribers(&self, output: Output) -> bool {
        match output {
            Output::FilteredDepth => self.subscribe_depth,
            Output::Mask => self.subscribe_mask,
        }
    }

    fn publish_depth(&mut self, image: DepthImage) {
        self.depth.push(image);
    }

    fn publish_mask(&mut self, image: MaskImage) {
        self.mask.push(image);
    }
}

fn gpu() -> GraphicsDevice {
    GraphicsDevice::new(GpuInit::default()).expect("GPU adapter")
}

/// A 0.4 m cube one metre in front of the camera.
fn cube_filter() -> SelfFilter {
    box_filter([0.4; 3])
}

/// One box-shaped link "base_link", centred on the link origin.
fn box_filter(size: [f32; 3]) -> SelfFilter {
    let description = ModelDescription {
        links: vec![LinkDescription {
            name: "base_link".into(),
            visuals: vec![Visual {
                geometry: Geometry::Box { size },
                origin: Origin::default(),
            }],
        }],
    };
    let source = InMemoryModelSource::new().with("robot_description", description);
    let mut library = MeshLibrary::new();
    let models = load_models(
        &[ModelEntry {
            model: "robot_description".into(),
            tf_prefix: String::new(),
        }],
        &source,
        &mut library,
    );
    assert_eq!(models.len(), 1);

    let mut settings = FilterSettings::new("world", "camera");
    settings.replace_value = REPLACE;
    settings.max_diff = 0.05;
    SelfFilter::new(settings, models, library)
}

fn poses() -> StaticPoseLookup {
    link_at(1.0)
}

/// Camera at the world origin, "base_link" `z` metres down its optical axis.
fn link_at(z: f64) -> StaticPoseLookup {
    StaticPoseLookup::new()
        .with("world", "camera", DAffine3::IDENTITY)
        .with("world", "base_link", DAffine3::from_translation(DVec3::new(0.0, 0.0, z)))
}

fn intrinsics(width: u32, height: u32) -> CameraIntrinsics {
    let scale = width as f64 / 64.0;
    CameraIntrinsics::new(
        50.0 * scale,
        50.0 * scale,
        width as f64 / 2.0,
        height as f64 / 2.0,
        width,
        height,
    )
}

/// Left half just behind the cube's front face, right half far behind it.
fn frame(width: u32, height: u32, stamp: u64) -> DepthFrame {
    let mut data = Vec::with_capacity((width * height) as usize);
    for _y in 0..height {
        for x in 0..width {
            data.push(if x < width / 2 { NEAR_ROBOT } else { FAR_BEHIND });
        }
    }
    DepthFrame::new(FrameHeader::new(Stamp(stamp), "camera"), width, height, data)
}

#[test]
#[ignore = "requires a GPU adapter"]
fn mask_and_filtered_depth_agree() {
    let gpu = gpu();
    let mut filter = cube_filter();
    let mut out = Recorder::all();

    let f = frame(64, 48, 1);
    let outcome = filter.process(&gpu, &f, &intrinsics(64, 48), &poses(), &mut out);
    assert!(matches!(outcome, FrameOutcome::Published { depth: true, mask: true }));

    let depth = &out.depth[0];
    let mask = &out.mask[0];
    assert_eq!(depth.header, f.header);
    assert!(mask.robot_pixels() > 0);

    for y in 0..48 {
        for x in 0..64 {
            let robot = mask.at(x, y) == 1;
            assert_eq!(robot, depth.at(x, y) == REPLACE, "pixel ({x}, {y})");
            if !robot {
                assert_eq!(depth.at(x, y), f.at(x, y), "pixel ({x}, {y})");
            }
        }
    }

    // Cube covers the centre; the left half is within tolerance, the right half is not.
    assert_eq!(mask.at(28, 24), 1);
    assert_eq!(mask.at(36, 24), 0);
    assert_eq!(depth.at(36, 24), FAR_BEHIND);
    assert_eq!(mask.at(0, 0), 0);
    assert_eq!(depth.at(0, 0), NEAR_ROBOT);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn invalid_depth_passes_through() {
    let gpu = gpu();
    let mut filter = cube_filter();

    let mut f = frame(64, 48, 1);
    f.data[24 * 64 + 28] = 0.0;
    let result = filter
        .filter_frame(&gpu, &f, &intrinsics(64, 48), &poses(), true)
        .unwrap();

    assert_eq!(result.depth.at(28, 24), 0.0);
    assert_eq!(result.mask.unwrap().at(28, 24), 0);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn padded_rows_are_compacted() {
    let gpu = gpu();
    let mut filter = cube_filter();

    let packed = frame(64, 48, 1);
    let stride = 80;
    let mut data = vec![99.0; stride * 48];
    for y in 0..48u32 {
        let row = packed.row(y);
        data[y as usize * stride..y as usize * stride + 64].copy_from_slice(row);
    }
    let padded = DepthFrame::with_stride(packed.header.clone(), 64, 48, stride, data);

    let k = intrinsics(64, 48);
    let a = filter.filter_frame(&gpu, &packed, &k, &poses(), false).unwrap();
    let b = filter.filter_frame(&gpu, &padded, &k, &poses(), false).unwrap();
    assert_eq!(a.depth.data, b.depth.data);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn resolution_change_is_idempotent() {
    let gpu = gpu();
    let mut filter = cube_filter();
    let poses = poses();

    let first = filter
        .filter_frame(&gpu, &frame(64, 48, 1), &intrinsics(64, 48), &poses, true)
        .unwrap();
    assert_eq!(filter.target_size(), Some((64, 48)));

    let small = filter
        .filter_frame(&gpu, &frame(32, 24, 2), &intrinsics(32, 24), &poses, true)
        .unwrap();
    assert_eq!(filter.target_size(), Some((32, 24)));
    assert_eq!(small.depth.data.len(), 32 * 24);

    let again = filter
        .filter_frame(&gpu, &frame(64, 48, 1), &intrinsics(64, 48), &poses, true)
        .unwrap();
    assert_eq!(filter.target_size(), Some((64, 48)));
    assert_eq!(filter.state(), PipelineState::Ready);

    let bits = |d: &DepthImage| d.data.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
    assert_eq!(bits(&first.depth), bits(&again.depth));
    assert_eq!(first.mask, again.mask);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn pose_failure_skips_frame_then_recovers() {
    let gpu = gpu();
    let mut filter = cube_filter();
    let k = intrinsics(64, 48);
    let mut out = Recorder::all();

    filter.process(&gpu, &frame(64, 48, 1), &k, &poses(), &mut out);
    assert_eq!(out.depth.len(), 1);

    let missing = StaticPoseLookup::new();
    let outcome = filter.process(&gpu, &frame(64, 48, 2), &k, &missing, &mut out);
    assert!(matches!(
        outcome,
        FrameOutcome::Skipped(SkipReason::Pose(LookupFailure::UnknownFrame(_)))
    ));
    assert_eq!(out.depth.len(), 1);
    assert_eq!(out.mask.len(), 1);
    assert_eq!(filter.state(), PipelineState::Ready);

    let outcome = filter.process(&gpu, &frame(64, 48, 3), &k, &poses(), &mut out);
    assert!(matches!(outcome, FrameOutcome::Published { .. }));
    assert_eq!(out.depth.len(), 2);
    assert_eq!(out.depth[0].data, out.depth[1].data);
    assert_eq!(out.depth[1].header.stamp, Stamp(3));
}

#[test]
#[ignore = "requires a GPU adapter"]
fn outputs_follow_subscribers() {
    let gpu = gpu();
    let mut filter = cube_filter();
    let k = intrinsics(64, 48);

    let mut depth_only = Recorder {
        subscribe_depth: true,
        ..Recorder::default()
    };
    let outcome = filter.process(&gpu, &frame(64, 48, 1), &k, &poses(), &mut depth_only);
    assert!(matches!(outcome, FrameOutcome::Published { depth: true, mask: false }));
    assert!(depth_only.mask.is_empty());

    let mut mask_only = Recorder {
        subscribe_mask: true,
        ..Recorder::default()
    };
    let outcome = filter.process(&gpu, &frame(64, 48, 2), &k, &poses(), &mut mask_only);
    assert!(matches!(outcome, FrameOutcome::Published { depth: false, mask: true }));
    assert!(mask_only.depth.is_empty());
    assert_eq!(mask_only.mask.len(), 1);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn empty_frame_leaves_pipeline_uninitialized() {
    let gpu = gpu();
    let mut filter = cube_filter();

    let empty = DepthFrame::new(FrameHeader::new(Stamp(1), "camera"), 0, 0, Vec::new());
    let err = filter
        .filter_frame(&gpu, &empty, &intrinsics(64, 48), &poses(), false)
        .unwrap_err();
    assert!(matches!(err, SkipReason::Target(TargetError::ZeroSize { .. })));
    assert_eq!(filter.state(), PipelineState::Uninitialized);

    // A valid size afterwards initializes normally.
    filter
        .filter_frame(&gpu, &frame(64, 48, 2), &intrinsics(64, 48), &poses(), false)
        .unwrap();
    assert_eq!(filter.state(), PipelineState::Ready);
}

#[test]
#[ignore = "requires a GPU adapter"]
fn tolerance_boundary_behind_flat_surface() {
    let gpu = gpu();
    // Thin slab filling the view; its front face sits exactly 1 m away.
    let mut filter = box_filter([4.0, 4.0, 0.02]);
    let poses = link_at(1.01);

    let (width, height) = (64, 48);
    let data = (0..height)
        .flat_map(|_| (0..width).map(|x| if x < width / 2 { 1.04 } else { 1.06 }))
        .collect();
    let f = DepthFrame::new(FrameHeader::new(Stamp(1), "camera"), width, height, data);

    let result = filter
        .filter_frame(&gpu, &f, &intrinsics(width, height), &poses, true)
        .unwrap();
    let mask = result.mask.unwrap();
    assert_eq!(mask.robot_pixels(), (width * height / 2) as usize);
    for y in 0..height {
        for x in 0..width {
            if x < width / 2 {
                assert_eq!(result.depth.at(x, y), REPLACE, "pixel ({x}, {y})");
                assert_eq!(mask.at(x, y), 1, "pixel ({x}, {y})");
            } else {
                assert_eq!(result.depth.at(x, y), 1.06, "pixel ({x}, {y})");
                assert_eq!(mask.at(x, y), 0, "pixel ({x}, {y})");
            }
        }
    }
}

#[test]
#[ignore = "requires a GPU adapter"]
fn oversized_frame_fails_once_per_size() {
    let gpu = gpu();
    let mut filter = cube_filter();
    let max = gpu.max_texture_dimension();

    let wide = frame(max + 1, 1, 1);
    for _ in 0..2 {
        let err = filter
            .filter_frame(&gpu, &wide, &intrinsics(max + 1, 1), &poses(), false)
            .unwrap_err();
        assert!(matches!(
            err,
            SkipReason::Target(TargetError::TooLarge { width, max: limit, .. })
                if width == max + 1 && limit == max
        ));
        assert_eq!(filter.state(), PipelineState::Uninitialized);
    }

    filter
        .filter_frame(&gpu, &frame(64, 48, 2), &intrinsics(64, 48), &poses(), false)
        .unwrap();
    assert_eq!(filter.state(), PipelineState::Ready);
}
